//! Client-side notification list
//!
//! Push events and fetched pages feed one set keyed by notification id. The
//! read flag only moves from unread to read when merging, except when a
//! failed mark-all-read is rolled back. The unread count is always computed
//! from the set, never cached.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::notification::{Notification, PushEvent};

/// Issued before a fetch; results from an older epoch are discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    epoch: u64,
}

/// An in-flight mark-all-read call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkAllRead {
    /// Newest `created_at` held when the call was issued; the server marks
    /// only notifications created at or before it
    pub through: DateTime<Utc>,
    ids: Vec<Uuid>,
    epoch: u64,
}

impl MarkAllRead {
    /// Notifications this call flipped locally
    pub fn ids(&self) -> &[Uuid] {
        &self.ids
    }
}

#[derive(Debug, Default)]
pub struct NotificationInbox {
    entries: HashMap<Uuid, Notification>,
    epoch: u64,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge(&mut self, incoming: Notification) -> bool {
        match self.entries.get_mut(&incoming.id) {
            Some(existing) => {
                let read = existing.read || incoming.read;
                *existing = incoming;
                existing.read = read;
                false
            }
            None => {
                self.entries.insert(incoming.id, incoming);
                true
            }
        }
    }

    /// Merge a real-time event; returns whether it was new
    pub fn receive_push(&mut self, event: PushEvent) -> bool {
        let inserted = self.merge(event.notification);
        if inserted {
            tracing::debug!(event = event.event.as_str(), unread = self.unread_count(), "Push received");
        }
        inserted
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket { epoch: self.epoch }
    }

    /// Union a fetched list into the set
    ///
    /// Returns false and changes nothing when the ticket predates a `reset`.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, fetched: Vec<Notification>) -> bool {
        if ticket.epoch != self.epoch {
            tracing::debug!("Discarding stale notification fetch");
            return false;
        }
        for notification in fetched {
            self.merge(notification);
        }
        true
    }

    /// Snapshot and optimistically flip everything currently unread
    ///
    /// Returns `None` when nothing is held at all.
    pub fn begin_mark_all_read(&mut self) -> Option<MarkAllRead> {
        let through = self.entries.values().map(|n| n.created_at).max()?;
        let mut ids = Vec::new();
        for notification in self.entries.values_mut().filter(|n| !n.read) {
            notification.read = true;
            ids.push(notification.id);
        }
        Some(MarkAllRead {
            through,
            ids,
            epoch: self.epoch,
        })
    }

    /// The server accepted the call; anything pushed meanwhile stays unread
    pub fn complete_mark_all_read(&mut self, call: &MarkAllRead) {
        if call.epoch != self.epoch {
            return;
        }
        for id in &call.ids {
            if let Some(notification) = self.entries.get_mut(id) {
                notification.read = true;
            }
        }
    }

    /// The server call failed; restore what this call flipped
    pub fn fail_mark_all_read(&mut self, call: &MarkAllRead) {
        if call.epoch != self.epoch {
            return;
        }
        for id in &call.ids {
            if let Some(notification) = self.entries.get_mut(id) {
                notification.read = false;
            }
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Notification> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.entries.get(&id)
    }

    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|n| !n.read).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first
    pub fn entries(&self) -> Vec<&Notification> {
        let mut entries: Vec<&Notification> = self.entries.values().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        entries
    }

    /// Forget everything; in-flight fetches and calls become stale
    pub fn reset(&mut self) {
        self.entries.clear();
        self.epoch += 1;
    }
}
