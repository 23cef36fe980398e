use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid status transition: {0}")]
    InvalidStatus(String),
}

impl StoreError {
    /// Connectivity loss that no later poll tick can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Database(sqlx::Error::PoolClosed) | StoreError::Database(sqlx::Error::Io(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid job: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueueError {
    pub fn is_fatal(&self) -> bool {
        match self {
            QueueError::Store(e) => e.is_fatal(),
            QueueError::Serialization(_) | QueueError::InvalidInput(_) => false,
        }
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::Store(StoreError::Database(e))
    }
}

/// Failure reported by a job handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessError {
    pub message: String,
}

impl ProcessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connectivity_loss_is_fatal() {
        assert!(StoreError::Database(sqlx::Error::PoolClosed).is_fatal());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_fatal());
        assert!(!StoreError::Database(sqlx::Error::PoolTimedOut).is_fatal());
        assert!(!StoreError::InvalidStatus("pending".into()).is_fatal());

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(QueueError::from(sqlx::Error::Io(io)).is_fatal());
    }

    #[test]
    fn process_error_displays_its_message() {
        assert_eq!(ProcessError::new("smtp down").to_string(), "smtp down");
    }
}
