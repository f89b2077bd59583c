//! Shared types, errors, events and configuration for Voxcart.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::VoxcartConfig;
pub use error::{Result, VoxcartError};
pub use events::CallEvent;
pub use types::*;
