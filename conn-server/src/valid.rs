use std::ops::Deref;

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    Json,
};
use http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use conn_slo::errors::{self, Code, WithBacktrace};

/// Query string (`Valid<T>`) or JSON body (`Valid<Json<T>>`) checked with
/// its `Validate` rules. Both reject with `InvalidArgument`.
pub struct Valid<T>(pub T);

impl<S, T> FromRequestParts<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = WithBacktrace;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let value: T = serde_urlencoded::from_str(query)
            .map_err(|err| errors::invalid_argument(&err))?;
        value.validate().map_err(Code::Validates)?;
        Ok(Self(value))
    }
}

impl<S, T> FromRequest<S> for Valid<Json<T>>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = WithBacktrace;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let value = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| errors::invalid_argument(&err.body_text()))?;
        value.deref().validate().map_err(Code::Validates)?;
        Ok(Self(value))
    }
}

/// JSON body decoded without schema rules. Malformed bodies are
/// `InvalidArgument` rather than axum's plain text rejection.
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = WithBacktrace;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| errors::invalid_argument(&err.body_text()))?;
        Ok(Self(value))
    }
}
