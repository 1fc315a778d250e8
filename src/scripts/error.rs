use thiserror::Error;

use crate::inventory::StoreError;
use crate::mesh::MeshError;

/// Reasons a script run stops
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The environment is missing something the script relies on
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// The operator asked for something the script refuses to do
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
    /// Operator input failed validation before anything was written
    #[error("Validation failed: {message}")]
    Validation { message: String },
    #[error("Inventory store error: {0}")]
    Store(#[from] StoreError),
    #[error("Mesh status query failed: {0}")]
    Mesh(#[from] MeshError),
}

impl ScriptError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ScriptError::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ScriptError::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ScriptError::Validation {
            message: message.into(),
        }
    }
}
