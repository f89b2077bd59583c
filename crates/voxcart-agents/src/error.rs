//! Error types for the agent engine.

use voxcart_core::error::VoxcartError;

use crate::types::{AgentState, AgentType};

/// Errors raised while launching or executing agents.
///
/// Business-rule rejections are not errors: agents complete with
/// `success: false` for those. Anything here ends the agent in `Error`.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),
    #[error("Agent type not registered: {0}")]
    UnregisteredAgent(AgentType),
    #[error("Agent execution timed out after {0} seconds")]
    Timeout(u64),
    #[error("Agent execution panicked: {0}")]
    Panicked(String),
    #[error("Invalid agent data: {0}")]
    InvalidData(String),
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(AgentState, AgentState),
    #[error("Commerce backend failed: {0}")]
    Commerce(#[from] CommerceError),
    #[error("Storage error: {0}")]
    Storage(#[from] VoxcartError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures reported by a commerce connector.
///
/// "Not found" is never an error; connectors return `Ok(None)` for it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommerceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
}
