#[derive(Debug)]
pub enum QueueRepositoryError {
    Serialization(String),
    DynamoDb(String),
    /// A transactional move between queue lists was cancelled, usually
    /// because another caller touched the same items first.
    Transaction(String),
    /// A conditional write lost to a concurrent writer, e.g. the target
    /// position was already taken or the entry had already moved.
    Conflict(String),
}

impl std::fmt::Display for QueueRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            QueueRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            QueueRepositoryError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            QueueRepositoryError::Conflict(msg) => write!(f, "Conflicting queue write: {}", msg),
        }
    }
}

impl std::error::Error for QueueRepositoryError {}
