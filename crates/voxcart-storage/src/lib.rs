//! Voxcart storage crate - SQLite persistence for calls and audit actions.
//!
//! Provides a WAL-mode SQLite database with versioned migrations and
//! repositories for call records and the per-agent audit trail.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{ActionRepository, CallRepository};
