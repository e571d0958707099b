#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    /// A conditional write lost against a concurrent writer.
    Conflict(String),
    Serialization(String),
    DynamoDb(String),
    Transaction(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "Not found: {}", what),
            StoreError::Conflict(msg) => write!(f, "Conflicting write: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            StoreError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}
