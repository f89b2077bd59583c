//! Database schema migrations.
//!
//! Version 1 creates the calls and actions tables plus the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use voxcart_core::error::VoxcartError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), VoxcartError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| VoxcartError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| VoxcartError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: calls_and_actions");
    }

    Ok(())
}

/// Version 1: calls and audit actions.
fn apply_v1(conn: &Connection) -> Result<(), VoxcartError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS calls (
            call_id     TEXT PRIMARY KEY NOT NULL,
            status      TEXT NOT NULL
                        CHECK (status IN ('in_progress', 'completed', 'failed')),
            started_at  INTEGER NOT NULL,
            ended_at    INTEGER,
            turns       INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_calls_started_at
            ON calls (started_at DESC);

        CREATE TABLE IF NOT EXISTS actions (
            id          TEXT PRIMARY KEY NOT NULL,
            call_id     TEXT NOT NULL,
            action_type TEXT NOT NULL,
            input       TEXT NOT NULL DEFAULT '{}',
            confidence  REAL NOT NULL DEFAULT 0.0,
            status      TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'success', 'failed')),
            detail      TEXT,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_actions_call
            ON actions (call_id, created_at ASC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'calls_and_actions');
        ",
    )
    .map_err(|e| VoxcartError::Storage(format!("Migration v1 failed: {}", e)))
}
