//! Voxcart server: HTTP status API, telephony media-stream socket and the
//! REST commerce adapter. The binary in `main.rs` wires these to the call
//! manager.

pub mod cli;
pub mod commerce;
pub mod error;
pub mod handlers;
pub mod media;
pub mod routes;
pub mod state;

pub use commerce::HttpCommerceConnector;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
