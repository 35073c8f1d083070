//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use events::TransitionError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. Ex. `domain` is dependent on `entity_api`, and `web` is dependent on `domain`,
/// but `web` should not be dependent, directly, on `entity_api`. Ultimately the various
/// `error_kind`s are used by `web` to return appropriate HTTP status codes and messages.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    /// The request was understood but the business rules refuse it.
    Rejected(RejectionKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    Other(String),
}

/// Entity errors translated from the `entity_api` layer and reduced to the
/// subset that matters to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    DbTransaction,
    Other(String),
}

#[derive(Debug, PartialEq)]
pub enum RejectionKind {
    /// Another writer changed the record between read and write.
    Conflict(String),
    InvalidTransition(String),
    /// A configured limit, such as the open-ticket cap.
    Policy(String),
    /// The actor or the record's state does not allow the operation.
    Precondition(String),
}

impl Error {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::rejected(RejectionKind::Conflict(message.into()))
    }

    pub fn policy(message: impl Into<String>) -> Self {
        Self::rejected(RejectionKind::Policy(message.into()))
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::rejected(RejectionKind::Precondition(message.into()))
    }

    fn rejected(kind: RejectionKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Rejected(kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            DomainErrorKind::Rejected(RejectionKind::Conflict(message))
            | DomainErrorKind::Rejected(RejectionKind::InvalidTransition(message))
            | DomainErrorKind::Rejected(RejectionKind::Policy(message))
            | DomainErrorKind::Rejected(RejectionKind::Precondition(message)) => {
                write!(f, "{message}")
            }
            DomainErrorKind::Internal(kind) => write!(f, "Domain Error: {kind:?}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => {
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
            }
            // Conditional updates only miss when a concurrent writer won
            EntityApiErrorKind::RecordNotUpdated => DomainErrorKind::Rejected(
                RejectionKind::Conflict("the record was changed by another request".to_string()),
            ),
            EntityApiErrorKind::SystemError => {
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::DbTransaction))
            }
            EntityApiErrorKind::Other => DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Other("EntityErrorKind".to_string()),
            )),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        EntityApiError::from(err).into()
    }
}

impl From<TransitionError> for Error {
    fn from(err: TransitionError) -> Self {
        Error {
            error_kind: DomainErrorKind::Rejected(RejectionKind::InvalidTransition(
                err.to_string(),
            )),
            source: Some(Box::new(err)),
        }
    }
}
