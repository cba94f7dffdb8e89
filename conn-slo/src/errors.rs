use std::{error::Error as StdError, fmt};

use backtrace::Backtrace;
use http::StatusCode;
use thiserror::Error;

pub trait ErrorCode: StdError + 'static {
    fn code(&self) -> (StatusCode, &'static str);
    fn kind(&self) -> ErrorKind;
}

/// Transport independent classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    AlreadyExists,
    NotFound,
    Unauthenticated,
    FailedPrecondition,
    Internal,
}

#[derive(Error, Debug)]
pub enum Code {
    #[error(transparent)]
    Any(#[from] anyhow::Error),
    #[error("Not found. {0}")]
    NotFound(String),
    #[error("Already exists. {0}")]
    AlreadyExists(String),
    #[error("Authentication is required to access this resource")]
    Unauthenticated,
    #[error("Please recheck the request.see: {0}")]
    Validates(#[source] validator::ValidationErrors),
    #[error("Please recheck the request.see: {0}")]
    InvalidArgument(String),
    #[error("Failed precondition. {0}")]
    FailedPrecondition(String),
}

impl ErrorCode for Code {
    fn code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Any(_) => (StatusCode::INTERNAL_SERVER_ERROR, "1010001"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "1010002"),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "1010003"),
            Self::Validates(_) => (StatusCode::BAD_REQUEST, "1010004"),
            Self::AlreadyExists(_) => (StatusCode::CONFLICT, "1010005"),
            Self::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "1010006"),
            Self::FailedPrecondition(_) => {
                (StatusCode::BAD_REQUEST, "1010007")
            }
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Any(_) => ErrorKind::Internal,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Validates(_) | Self::InvalidArgument(_) => {
                ErrorKind::InvalidArgument
            }
            Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
        }
    }
}

pub struct WithBacktrace {
    source: Code,
    backtrace: Backtrace,
}

impl WithBacktrace {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn code(&self) -> (StatusCode, &'static str) {
        self.source.code()
    }
}

impl fmt::Debug for WithBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithBacktrace")
            .field("source", &self.source)
            .field("backtrace", &self.backtrace)
            .finish()
    }
}

impl fmt::Display for WithBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl StdError for WithBacktrace {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl From<Code> for WithBacktrace {
    fn from(code: Code) -> Self {
        WithBacktrace {
            source: code,
            backtrace: Backtrace::new(),
        }
    }
}

impl From<WithBacktrace> for Code {
    fn from(value: WithBacktrace) -> Self {
        value.source
    }
}

impl PartialEq for WithBacktrace {
    fn eq(&self, other: &Self) -> bool {
        let (_, src_code) = self.source.code();
        let (_, dst_code) = other.source.code();
        src_code == dst_code
    }
}

#[inline]
pub fn any<E: StdError>(err: E) -> WithBacktrace {
    WithBacktrace {
        source: Code::Any(anyhow::anyhow!("{}", err.to_string())),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn anyhow(err: anyhow::Error) -> WithBacktrace {
    WithBacktrace {
        source: Code::Any(err),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn not_found<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::NotFound(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn already_exists<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::AlreadyExists(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn unauthenticated() -> WithBacktrace {
    WithBacktrace {
        source: Code::Unauthenticated,
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn invalid_argument<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::InvalidArgument(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn failed_precondition<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::FailedPrecondition(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[cfg(feature = "axum-resp")]
mod axum {
    use axum::response::IntoResponse;
    use serde_json::json;

    use super::ErrorCode;

    impl IntoResponse for super::WithBacktrace {
        fn into_response(self) -> axum::response::Response {
            tracing::error!("{:?}", self);

            let (status_code, code) = self.source.code();
            let kind = self.source.kind();

            let payload = json!({
                "code": code,
                "message": self.to_string(),
            });

            let mut response =
                (status_code, axum::Json(payload)).into_response();
            response.extensions_mut().insert(kind);
            response
        }
    }
}

#[cfg(feature = "tonic-status")]
mod tonic {
    use super::{ErrorCode, ErrorKind};

    impl From<super::WithBacktrace> for tonic::Status {
        fn from(err: super::WithBacktrace) -> Self {
            tracing::error!("{:?}", err);

            let message = err.to_string();
            match err.source.kind() {
                ErrorKind::InvalidArgument => {
                    tonic::Status::invalid_argument(message)
                }
                ErrorKind::AlreadyExists => {
                    tonic::Status::already_exists(message)
                }
                ErrorKind::NotFound => tonic::Status::not_found(message),
                ErrorKind::Unauthenticated => {
                    tonic::Status::unauthenticated(message)
                }
                ErrorKind::FailedPrecondition => {
                    tonic::Status::failed_precondition(message)
                }
                ErrorKind::Internal => tonic::Status::internal(message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_kind() {
        assert_eq!(
            not_found("connector").code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            already_exists("connector").code().0,
            StatusCode::CONFLICT
        );
        assert_eq!(unauthenticated().code().0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            failed_precondition("connected").kind(),
            ErrorKind::FailedPrecondition
        );
        assert_eq!(
            any(std::fmt::Error).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn validation_errors_are_invalid_arguments() {
        let err: WithBacktrace =
            Code::Validates(validator::ValidationErrors::new()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn equality_compares_service_codes() {
        assert_eq!(not_found("a"), not_found("b"));
        assert_ne!(not_found("a"), invalid_argument("a"));
    }

    #[test]
    fn message_keeps_detail() {
        let err = failed_precondition("still in use by pipeline: p1");
        assert_eq!(
            err.to_string(),
            "Failed precondition. still in use by pipeline: p1"
        );
    }
}
