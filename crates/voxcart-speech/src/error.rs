//! Error types for the speech session.

use voxcart_core::error::VoxcartError;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Missing API key: set {0}")]
    MissingApiKey(String),
    #[error("Invalid connection request: {0}")]
    InvalidRequest(String),
    #[error("Connection failed: {0}")]
    Connect(String),
}

impl From<SpeechError> for VoxcartError {
    fn from(err: SpeechError) -> Self {
        VoxcartError::Speech(err.to_string())
    }
}
