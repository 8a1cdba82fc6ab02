//! Error types for the document codec

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Markup error at byte {offset}: {message}")]
    Markup { offset: usize, message: String },

    #[error("Invalid state envelope: {0}")]
    Envelope(String),

    #[error("Envelope is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] luthor_document::DocumentError),

    #[error("Invalid block directive: {0}")]
    Directive(String),
}
