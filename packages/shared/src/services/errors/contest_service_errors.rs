use crate::repositories::errors::store_errors::StoreError;

#[derive(Debug)]
pub enum ContestServiceError {
    /// One or more participants were busy or missing when the contest was
    /// about to be created. Lists only the participants that were unavailable.
    Unavailable { participant_ids: Vec<String> },
    /// Both sides of a contest must be different participants.
    InvalidPairing(String),
    ContestNotFound(String),
    ParticipantNotFound(String),
    AlreadyFinished(String),
    InvalidResult(String),
    RepositoryError(StoreError),
}

impl ContestServiceError {
    /// Contention between concurrent writers; callers recover locally.
    pub fn is_contention(&self) -> bool {
        matches!(self, ContestServiceError::Unavailable { .. })
    }
}

impl std::fmt::Display for ContestServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContestServiceError::Unavailable { participant_ids } => {
                write!(f, "Participants busy or not found: {}", participant_ids.join(", "))
            }
            ContestServiceError::InvalidPairing(id) => {
                write!(f, "Participant {} cannot play against itself", id)
            }
            ContestServiceError::ContestNotFound(id) => write!(f, "Contest not found: {}", id),
            ContestServiceError::ParticipantNotFound(id) => {
                write!(f, "Participant not found: {}", id)
            }
            ContestServiceError::AlreadyFinished(id) => {
                write!(f, "Contest already finished: {}", id)
            }
            ContestServiceError::InvalidResult(raw) => write!(f, "Invalid result: {:?}", raw),
            ContestServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for ContestServiceError {}

impl From<StoreError> for ContestServiceError {
    fn from(err: StoreError) -> Self {
        ContestServiceError::RepositoryError(err)
    }
}
