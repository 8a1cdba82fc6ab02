//! Error types for the composition runtime

use luthor_document::DocumentError;
use thiserror::Error;

/// Invalid composition setup, detected before any extension registers
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Duplicate extension id: {0}")]
    DuplicateExtension(String),

    #[error("Node type '{tag}' is claimed by both '{first}' and '{second}'")]
    NodeTypeConflict {
        tag: String,
        first: String,
        second: String,
    },

    #[error("{kind} '{name}' is declared by both '{first}' and '{second}'")]
    NameCollision {
        kind: &'static str,
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid configuration for extension '{id}': {message}")]
    InvalidExtensionConfig { id: String, message: String },

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Extension '{id}' failed to register: {source}")]
    Registration {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    #[error("Document update failed: {0}")]
    Mutation(#[from] DocumentError),

    #[error("Command {command} failed: {message}")]
    Failed { command: String, message: String },

    #[error("Composition has been disposed")]
    Disposed,
}

impl CommandError {
    pub fn failed(command: &str, message: impl Into<String>) -> Self {
        CommandError::Failed {
            command: command.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_arguments(command: &str, message: impl Into<String>) -> Self {
        CommandError::InvalidArguments {
            command: command.to_string(),
            message: message.into(),
        }
    }
}
