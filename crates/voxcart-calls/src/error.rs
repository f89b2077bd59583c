//! Error types for call session management.

use voxcart_core::error::VoxcartError;
use voxcart_core::types::CallId;
use voxcart_speech::SpeechError;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Call already active: {0}")]
    DuplicateCall(CallId),
    #[error("No active call: {0}")]
    UnknownCall(CallId),
    #[error("Speech session failed to start: {0}")]
    Speech(#[from] SpeechError),
    #[error("Call manager is shutting down")]
    ShuttingDown,
}

impl From<CallError> for VoxcartError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::UnknownCall(id) => VoxcartError::NotFound(format!("call {}", id)),
            CallError::ShuttingDown => VoxcartError::ShuttingDown,
            CallError::Speech(e) => e.into(),
            other => VoxcartError::Telephony(other.to_string()),
        }
    }
}
