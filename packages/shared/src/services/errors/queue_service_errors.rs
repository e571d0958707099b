use std::fmt;

use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;
use crate::repositories::errors::store_errors::StoreError;

#[derive(Debug)]
pub enum QueueServiceError {
    ParticipantNotFound(String),
    /// The participant is paused, withdrawn or currently in a contest.
    NotEligible(String),
    ValidationError(String),
    RepositoryError(QueueRepositoryError),
    StoreError(StoreError),
}

impl fmt::Display for QueueServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueServiceError::ParticipantNotFound(id) => {
                write!(f, "Participant not found: {}", id)
            }
            QueueServiceError::NotEligible(id) => {
                write!(f, "Participant {} cannot be queued right now", id)
            }
            QueueServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            QueueServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            QueueServiceError::StoreError(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for QueueServiceError {}

impl From<QueueRepositoryError> for QueueServiceError {
    fn from(err: QueueRepositoryError) -> Self {
        QueueServiceError::RepositoryError(err)
    }
}

impl From<StoreError> for QueueServiceError {
    fn from(err: StoreError) -> Self {
        QueueServiceError::StoreError(err)
    }
}
