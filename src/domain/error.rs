use thiserror::Error;

/// Faults raised by the storage behind a product source.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("storage unavailable: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
