//! Append-only audit log of field changes on an action

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ActorContext, UserId};

/// Largest page the history reader will return
pub const MAX_PAGE_SIZE: u32 = 100;

/// One field's before/after values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, old_value: impl Into<Value>, new_value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    pub fn status(old: &str, new: &str) -> Self {
        Self::new("status", old, new)
    }

    pub fn description(old: &str, new: &str) -> Self {
        Self::new("description", old, new)
    }

    pub fn assignee(old: Option<&str>, new: &str) -> Self {
        let old = old.map(Value::from).unwrap_or(Value::Null);
        Self::new("assignee", old, new)
    }

    /// The whole loop before and after, not a delta
    pub fn sub_assigned(before: &[UserId], after: &[UserId]) -> Self {
        Self::new("subAssigned", before.to_vec(), after.to_vec())
    }
}

/// A persisted history entry; never updated or deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub action_id: Uuid,
    pub modified_by: UserId,
    pub modified_by_name: String,
    pub role: String,
    pub changes: Vec<FieldChange>,
    pub created_at: DateTime<Utc>,
}

/// Input for `ActionStore::log_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub action_id: Uuid,
    pub modified_by: UserId,
    pub modified_by_name: String,
    pub role: String,
    pub changes: Vec<FieldChange>,
}

impl NewHistoryEntry {
    pub fn by(actor: &ActorContext, action_id: Uuid, changes: Vec<FieldChange>) -> Self {
        Self {
            action_id,
            modified_by: actor.user_id.clone(),
            modified_by_name: actor.user_name.clone(),
            role: actor.role.clone(),
            changes,
        }
    }
}

/// One page of history, newest first, with the total entry count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub data: Vec<HistoryEntry>,
    pub total: u64,
}

/// 1-based page and clamped size, as an SQL offset/limit pair
pub fn page_bounds(page: u32, page_size: u32) -> (i64, i64) {
    let page = page.max(1);
    let size = page_size.clamp(1, MAX_PAGE_SIZE);
    (i64::from(page - 1) * i64::from(size), i64::from(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_change_shape() {
        let change = FieldChange::status("Pending", "InProgress");
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["field"], "status");
        assert_eq!(json["old_value"], "Pending");
        assert_eq!(json["new_value"], "InProgress");
    }

    #[test]
    fn test_sub_assigned_records_full_arrays() {
        let before = vec!["u1".to_string()];
        let after = vec!["u1".to_string(), "u2".to_string()];
        let change = FieldChange::sub_assigned(&before, &after);
        assert_eq!(change.field, "subAssigned");
        assert_eq!(change.old_value, serde_json::json!(["u1"]));
        assert_eq!(change.new_value, serde_json::json!(["u1", "u2"]));
    }

    #[test]
    fn test_assignee_change_from_nobody() {
        let change = FieldChange::assignee(None, "u2");
        assert_eq!(change.old_value, Value::Null);
        assert_eq!(change.new_value, serde_json::json!("u2"));
    }

    #[test]
    fn test_new_entry_by_actor() {
        let actor = ActorContext::new("u1", "Ana Gomez", "manager", "acme");
        let action_id = Uuid::new_v4();
        let entry = NewHistoryEntry::by(&actor, action_id, vec![FieldChange::status("Pending", "Completed")]);
        assert_eq!(entry.modified_by, "u1");
        assert_eq!(entry.modified_by_name, "Ana Gomez");
        assert_eq!(entry.role, "manager");
        assert_eq!(entry.action_id, action_id);
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(1, 10), (0, 10));
        assert_eq!(page_bounds(3, 10), (20, 10));
        // page 0 is treated as the first page
        assert_eq!(page_bounds(0, 10), (0, 10));
        assert_eq!(page_bounds(1, 0), (0, 1));
        assert_eq!(page_bounds(2, 500), (100, 100));
    }
}
