use std::collections::HashMap;

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts, Path};
use http::request::Parts;

use conn_slo::{
    errors::{self, WithBacktrace},
    Result,
};

use crate::AppState;

/// `users/{subject}`. An empty subject is unauthenticated.
pub fn owner_of(subject: &str) -> Result<String> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(errors::unauthenticated());
    }
    Ok(format!("users/{}", subject))
}

/// The authenticated caller of a public route.
///
/// The subject uid comes from the header named by `subject_header`, set by
/// the gateway after it verified the token. Routes nested under
/// `/users/{user}` must name the caller.
#[derive(Debug, Clone)]
pub struct Caller {
    pub owner: String,
}

impl<S> FromRequestParts<S> for Caller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WithBacktrace;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let subject = parts
            .headers
            .get(app.config.subject_header.as_str())
            .and_then(|v| v.to_str().ok())
            .ok_or_else(errors::unauthenticated)?;
        let owner = owner_of(subject)?;

        let params = <Path<HashMap<String, String>> as OptionalFromRequestParts<
            S,
        >>::from_request_parts(parts, state)
        .await
        .map_err(errors::any)?;
        if let Some(user) = params.as_ref().and_then(|v| v.get("user")) {
            if format!("users/{}", user) != owner {
                return Err(errors::not_found(&format!("users/{}", user)));
            }
        }
        Ok(Self { owner })
    }
}

#[cfg(test)]
mod tests {
    use conn_slo::errors::ErrorKind;

    use super::*;

    #[test]
    fn owner_from_subject() {
        assert_eq!(owner_of("abc").unwrap(), "users/abc");
        assert_eq!(owner_of(" abc ").unwrap(), "users/abc");
        assert_eq!(owner_of("").unwrap_err().kind(), ErrorKind::Unauthenticated);
    }
}
