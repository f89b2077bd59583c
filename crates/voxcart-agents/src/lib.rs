//! Agent engine for Voxcart.
//!
//! Classifies caller utterances into intents, runs one task agent per call
//! through a shared state machine, and relays agent lifecycle events to the
//! call layer.

pub mod address;
pub mod agent;
pub mod commerce;
pub mod error;
pub mod handler;
pub mod intent;
pub mod memory;
pub mod orchestrator;
pub mod store;
pub mod sweeper;
pub mod types;

pub use agent::{Agent, AgentContext, AgentDeps, AgentPolicy};
pub use commerce::CommerceConnector;
pub use error::{AgentError, CommerceError};
pub use handler::{AgentHandler, AgentRegistry};
pub use intent::IntentDetector;
pub use memory::{InMemoryActionStore, InMemoryCommerce};
pub use orchestrator::{ActiveAgentInfo, AgentOrchestrator};
pub use store::ActionStore;
pub use sweeper::CleanupSweeper;
pub use types::{
    AgentEvent, AgentOutcome, AgentResult, AgentState, AgentStats, AgentType, FieldMap, Intent,
    IntentResult, OrchestratorEvent,
};
