//! Call session management for Voxcart.
//!
//! Wires one telephony leg to one speech session, classifies what the caller
//! says, and drives the agent orchestrator. Agent outcomes flow back into the
//! live conversation as context updates.

pub mod error;
pub mod manager;
pub mod routing;

pub use error::CallError;
pub use manager::{CallInfo, CallSessionManager, TelephonyOutput};
pub use routing::{route_transcript, Route};
