use thiserror::Error;

/// Top-level error type for the Voxcart system.
///
/// Subsystem crates keep their own error enums and convert into this one
/// (or wrap it) so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoxcartError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Commerce error: {0}")]
    Commerce(String),

    #[error("Speech session error: {0}")]
    Speech(String),

    #[error("Telephony error: {0}")]
    Telephony(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for VoxcartError {
    fn from(err: toml::de::Error) -> Self {
        VoxcartError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VoxcartError {
    fn from(err: toml::ser::Error) -> Self {
        VoxcartError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VoxcartError {
    fn from(err: serde_json::Error) -> Self {
        VoxcartError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Voxcart operations.
pub type Result<T> = std::result::Result<T, VoxcartError>;
