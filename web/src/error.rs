use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, InternalErrorKind, RejectionKind,
};

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound)) => {
                StatusCode::NOT_FOUND
            }
            DomainErrorKind::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DomainErrorKind::Rejected(RejectionKind::Conflict(_)) => StatusCode::CONFLICT,
            DomainErrorKind::Rejected(
                RejectionKind::InvalidTransition(_)
                | RejectionKind::Policy(_)
                | RejectionKind::Precondition(_),
            ) => StatusCode::BAD_REQUEST,
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::NOT_FOUND => "NOT FOUND".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Internal error while handling request: {:?}", self.0);
                "INTERNAL SERVER ERROR".to_string()
            }
            _ => {
                debug!("Request rejected: {}", self.0);
                self.0.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        Error(err).into_response().status()
    }

    #[test]
    fn rejections_map_to_client_errors() {
        assert_eq!(
            status_of(DomainError::conflict("taken")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::policy("too many")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::precondition("not yours")),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_entities_map_to_not_found() {
        let err = DomainError {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::NotFound,
            )),
        };

        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_failures_map_to_internal_server_error() {
        let err = DomainError {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::DbTransaction,
            )),
        };

        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
