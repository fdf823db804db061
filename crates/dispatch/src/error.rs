use thiserror::Error;

use curbside_store::StoreError;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("{0}")]
    NotAuthorized(&'static str),
    #[error("{0}")]
    Precondition(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Duplicate(&'static str),
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl OpError {
    pub fn code(&self) -> &'static str {
        match self {
            OpError::NotAuthorized(_) => "not_authorized",
            OpError::Precondition(_) => "precondition_failed",
            OpError::NotFound(_) => "not_found",
            OpError::Duplicate(_) => "duplicate",
            OpError::Upstream(_) => "internal_error",
        }
    }

    // Upstream detail stays in the logs; callers get a generic failure.
    pub fn public_message(&self) -> String {
        match self {
            OpError::Upstream(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for OpError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => OpError::NotFound("ride not found"),
            StoreError::NoMatch => OpError::Precondition("ride unavailable"),
            StoreError::Duplicate => OpError::Duplicate("record already exists"),
            StoreError::Internal(detail) => OpError::Upstream(detail),
        }
    }
}

impl From<anyhow::Error> for OpError {
    fn from(err: anyhow::Error) -> Self {
        OpError::Upstream(err.to_string())
    }
}
