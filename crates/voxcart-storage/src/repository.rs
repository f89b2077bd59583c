//! Repository implementations for SQLite-backed persistence.
//!
//! Provides CallRepository and ActionRepository operating on the Database
//! struct using raw SQL. Records are created and updated, never deleted.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use uuid::Uuid;

use voxcart_core::error::VoxcartError;
use voxcart_core::types::{
    ActionId, ActionRecord, ActionStatus, CallId, CallRecord, CallStatus, NewAction, Timestamp,
};

use crate::db::Database;

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> VoxcartError + '_ {
    move |e| VoxcartError::Storage(format!("{}: {}", context, e))
}

// =============================================================================
// Calls
// =============================================================================

/// Repository for call records.
#[derive(Debug, Clone)]
pub struct CallRepository {
    db: Arc<Database>,
}

impl CallRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new in-progress call.
    pub fn create(&self, call_id: &CallId) -> Result<CallRecord, VoxcartError> {
        let record = CallRecord {
            call_id: call_id.clone(),
            status: CallStatus::InProgress,
            started_at: Timestamp::now(),
            ended_at: None,
            turns: 0,
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO calls (call_id, status, started_at, turns) VALUES (?1, ?2, ?3, 0)",
                rusqlite::params![
                    record.call_id.as_str(),
                    record.status.to_string(),
                    record.started_at.0
                ],
            )
            .map_err(storage_err("Failed to create call"))?;
            Ok(())
        })?;
        Ok(record)
    }

    /// Set the call status. Terminal statuses also stamp `ended_at`.
    pub fn update_status(&self, call_id: &CallId, status: CallStatus) -> Result<(), VoxcartError> {
        let ended_at = match status {
            CallStatus::InProgress => None,
            CallStatus::Completed | CallStatus::Failed => Some(Timestamp::now().0),
        };
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE calls SET status = ?1, ended_at = COALESCE(?2, ended_at) WHERE call_id = ?3",
                rusqlite::params![status.to_string(), ended_at, call_id.as_str()],
            )
            .map_err(storage_err("Failed to update call status"))
        })?;
        if changed == 0 {
            return Err(VoxcartError::NotFound(format!("call {}", call_id)));
        }
        Ok(())
    }

    /// Count one more conversation turn against the call.
    pub fn record_turn(&self, call_id: &CallId) -> Result<(), VoxcartError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE calls SET turns = turns + 1 WHERE call_id = ?1",
                rusqlite::params![call_id.as_str()],
            )
            .map_err(storage_err("Failed to record turn"))?;
            Ok(())
        })
    }

    pub fn get_by_id(&self, call_id: &CallId) -> Result<Option<CallRecord>, VoxcartError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT call_id, status, started_at, ended_at, turns FROM calls WHERE call_id = ?1",
                    rusqlite::params![call_id.as_str()],
                    raw_call_row,
                )
                .optional()
                .map_err(storage_err("Failed to load call"))?;
            row.map(RawCallRow::into_record).transpose()
        })
    }

    /// Most recently started calls first.
    pub fn list_recent(&self, limit: u32) -> Result<Vec<CallRecord>, VoxcartError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT call_id, status, started_at, ended_at, turns FROM calls
                     ORDER BY started_at DESC, rowid DESC LIMIT ?1",
                )
                .map_err(storage_err("Failed to prepare call listing"))?;
            let rows = stmt
                .query_map(rusqlite::params![limit], raw_call_row)
                .map_err(storage_err("Failed to list calls"))?;

            let mut records = Vec::new();
            for row in rows {
                let raw = row.map_err(storage_err("Failed to read call row"))?;
                records.push(raw.into_record()?);
            }
            Ok(records)
        })
    }
}

struct RawCallRow {
    call_id: String,
    status: String,
    started_at: i64,
    ended_at: Option<i64>,
    turns: u32,
}

fn raw_call_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCallRow> {
    Ok(RawCallRow {
        call_id: row.get(0)?,
        status: row.get(1)?,
        started_at: row.get(2)?,
        ended_at: row.get(3)?,
        turns: row.get(4)?,
    })
}

impl RawCallRow {
    fn into_record(self) -> Result<CallRecord, VoxcartError> {
        Ok(CallRecord {
            call_id: CallId(self.call_id),
            status: self.status.parse().map_err(VoxcartError::Storage)?,
            started_at: Timestamp(self.started_at),
            ended_at: self.ended_at.map(Timestamp),
            turns: self.turns,
        })
    }
}

// =============================================================================
// Actions
// =============================================================================

/// Repository for the agent audit trail.
#[derive(Debug, Clone)]
pub struct ActionRepository {
    db: Arc<Database>,
}

impl ActionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a pending action and return its handle.
    pub fn create(&self, action: &NewAction) -> Result<ActionId, VoxcartError> {
        let id = ActionId::new();
        let now = Timestamp::now().0;
        let input = serde_json::to_string(&action.input)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO actions (id, call_id, action_type, input, confidence, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
                rusqlite::params![
                    id.to_string(),
                    action.call_id.as_str(),
                    action.action_type,
                    input,
                    action.confidence as f64,
                    now,
                ],
            )
            .map_err(storage_err("Failed to create action"))?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn update_status(
        &self,
        id: ActionId,
        status: ActionStatus,
        detail: Option<&str>,
    ) -> Result<(), VoxcartError> {
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE actions SET status = ?1, detail = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![status.to_string(), detail, Timestamp::now().0, id.to_string()],
            )
            .map_err(storage_err("Failed to update action"))
        })?;
        if changed == 0 {
            return Err(VoxcartError::NotFound(format!("action {}", id)));
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: ActionId) -> Result<Option<ActionRecord>, VoxcartError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, call_id, action_type, input, confidence, status, detail, created_at, updated_at
                     FROM actions WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    raw_action_row,
                )
                .optional()
                .map_err(storage_err("Failed to load action"))?;
            row.map(RawActionRow::into_record).transpose()
        })
    }

    /// All actions for a call in creation order.
    pub fn list_for_call(&self, call_id: &CallId) -> Result<Vec<ActionRecord>, VoxcartError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, call_id, action_type, input, confidence, status, detail, created_at, updated_at
                     FROM actions WHERE call_id = ?1 ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(storage_err("Failed to prepare action listing"))?;
            let rows = stmt
                .query_map(rusqlite::params![call_id.as_str()], raw_action_row)
                .map_err(storage_err("Failed to list actions"))?;

            let mut records = Vec::new();
            for row in rows {
                let raw = row.map_err(storage_err("Failed to read action row"))?;
                records.push(raw.into_record()?);
            }
            Ok(records)
        })
    }
}

struct RawActionRow {
    id: String,
    call_id: String,
    action_type: String,
    input: String,
    confidence: f64,
    status: String,
    detail: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn raw_action_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawActionRow> {
    Ok(RawActionRow {
        id: row.get(0)?,
        call_id: row.get(1)?,
        action_type: row.get(2)?,
        input: row.get(3)?,
        confidence: row.get(4)?,
        status: row.get(5)?,
        detail: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl RawActionRow {
    fn into_record(self) -> Result<ActionRecord, VoxcartError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| VoxcartError::Storage(format!("Invalid action id {}: {}", self.id, e)))?;
        Ok(ActionRecord {
            id: ActionId(id),
            call_id: CallId(self.call_id),
            action_type: self.action_type,
            input: serde_json::from_str(&self.input)?,
            confidence: self.confidence as f32,
            status: self.status.parse().map_err(VoxcartError::Storage)?,
            detail: self.detail,
            created_at: Timestamp(self.created_at),
            updated_at: Timestamp(self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    fn new_action(call: &str) -> NewAction {
        NewAction {
            call_id: CallId::from(call),
            action_type: "RefundAgent".to_string(),
            input: serde_json::json!({"order_id": "5001"}),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_call_create_and_get() {
        let repo = CallRepository::new(setup());
        let call_id = CallId::from("CA1");
        let created = repo.create(&call_id).unwrap();
        assert_eq!(created.status, CallStatus::InProgress);

        let loaded = repo.get_by_id(&call_id).unwrap().unwrap();
        assert_eq!(loaded.call_id, call_id);
        assert_eq!(loaded.status, CallStatus::InProgress);
        assert!(loaded.ended_at.is_none());
        assert_eq!(loaded.turns, 0);
    }

    #[test]
    fn test_call_duplicate_id_rejected() {
        let repo = CallRepository::new(setup());
        let call_id = CallId::from("CA1");
        repo.create(&call_id).unwrap();
        assert!(repo.create(&call_id).is_err());
    }

    #[test]
    fn test_call_status_update_stamps_end() {
        let repo = CallRepository::new(setup());
        let call_id = CallId::from("CA2");
        repo.create(&call_id).unwrap();
        repo.record_turn(&call_id).unwrap();
        repo.record_turn(&call_id).unwrap();
        repo.update_status(&call_id, CallStatus::Completed).unwrap();

        let loaded = repo.get_by_id(&call_id).unwrap().unwrap();
        assert_eq!(loaded.status, CallStatus::Completed);
        assert!(loaded.ended_at.is_some());
        assert_eq!(loaded.turns, 2);
    }

    #[test]
    fn test_call_update_unknown_is_not_found() {
        let repo = CallRepository::new(setup());
        let err = repo
            .update_status(&CallId::from("ghost"), CallStatus::Failed)
            .unwrap_err();
        assert!(matches!(err, VoxcartError::NotFound(_)));
    }

    #[test]
    fn test_call_get_missing_is_none() {
        let repo = CallRepository::new(setup());
        assert!(repo.get_by_id(&CallId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn test_call_list_recent_respects_limit() {
        let repo = CallRepository::new(setup());
        for i in 0..5 {
            repo.create(&CallId::new(format!("CA{}", i))).unwrap();
        }
        let recent = repo.list_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].call_id.as_str(), "CA4");
    }

    #[test]
    fn test_action_create_update_get() {
        let repo = ActionRepository::new(setup());
        let id = repo.create(&new_action("CA1")).unwrap();

        let pending = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(pending.status, ActionStatus::Pending);
        assert_eq!(pending.input["order_id"], "5001");
        assert!((pending.confidence - 0.9).abs() < 1e-6);
        assert!(pending.detail.is_none());

        repo.update_status(id, ActionStatus::Failed, Some("Order not found"))
            .unwrap();
        let failed = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(failed.status, ActionStatus::Failed);
        assert_eq!(failed.detail.as_deref(), Some("Order not found"));
    }

    #[test]
    fn test_action_update_unknown_is_not_found() {
        let repo = ActionRepository::new(setup());
        let err = repo
            .update_status(ActionId::new(), ActionStatus::Success, None)
            .unwrap_err();
        assert!(matches!(err, VoxcartError::NotFound(_)));
    }

    #[test]
    fn test_action_list_for_call_in_order() {
        let repo = ActionRepository::new(setup());
        let first = repo.create(&new_action("CA1")).unwrap();
        let second = repo.create(&new_action("CA1")).unwrap();
        repo.create(&new_action("CA2")).unwrap();

        let actions = repo.list_for_call(&CallId::from("CA1")).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id, first);
        assert_eq!(actions[1].id, second);
    }
}
