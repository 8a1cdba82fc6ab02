//! Error types for documents

use thiserror::Error;

use crate::mutations::MutationError;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Update '{tag}' failed: {source}")]
    Update {
        tag: String,
        #[source]
        source: MutationError,
    },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocumentError {
    /// Underlying mutation failure, if any
    pub fn mutation(&self) -> Option<&MutationError> {
        match self {
            DocumentError::Update { source, .. } => Some(source),
            _ => None,
        }
    }
}
