//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use opsdesk::action::{
    Action, ActionDraft, ActionEngine, ActionStatus, Comment, HistoryEntry, HistoryPage,
    NewAction, NewComment, NewHistoryEntry, Priority,
};
use opsdesk::error::{AppError, Result};
use opsdesk::models::{ActorContext, Stream, SubStream, User, UserScope};
use opsdesk::notify::{NewNotification, Notification, NotificationHub};
use opsdesk::store::{run_migrations, ActionStore, Store};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const WORKSPACE: &str = "acme";

pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn user(id: &str, name: &str, role: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        role: role.to_string(),
    }
}

pub fn ana() -> ActorContext {
    ActorContext::new("u1", "Ana Gomez", "member", WORKSPACE)
}

pub fn ben() -> ActorContext {
    ActorContext::new("u2", "Ben Gomez", "member", WORKSPACE)
}

pub fn cy() -> ActorContext {
    ActorContext::new("u3", "Cy Lee", "member", WORKSPACE)
}

pub fn dee() -> ActorContext {
    ActorContext::new("u4", "Dee Ray", "member", WORKSPACE)
}

pub fn admin() -> ActorContext {
    ActorContext::new("u9", "Ada Admin", "admin", WORKSPACE)
}

/// Users u1..u4 plus an admin; stream Ops holds u1, u2, u3 and its
/// sub-stream Night shift holds u2. u4 belongs to no stream.
pub async fn seed(store: &Store) {
    for actor in [ana(), ben(), cy(), dee(), admin()] {
        store
            .add_user(WORKSPACE, &actor.as_user())
            .await
            .expect("Failed to add user");
    }
    store.create_stream(WORKSPACE, "Ops").await.unwrap();
    store
        .create_sub_stream(WORKSPACE, "Ops", "Night shift", "after hours")
        .await
        .unwrap();
    for id in ["u1", "u2", "u3", "u9"] {
        store.add_member(WORKSPACE, id, "Ops", None).await.unwrap();
    }
    store
        .add_member(WORKSPACE, "u2", "Ops", Some("Night shift"))
        .await
        .unwrap();
}

pub fn due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
}

/// A complete draft in Ops assigned to `assignee`
pub fn ops_draft(title: &str, assignee: &ActorContext) -> ActionDraft {
    ActionDraft::new(title, "rotate before expiry")
        .in_stream("Ops")
        .assigned_to(assignee.as_user())
        .with_priority(Priority::High)
        .due(due())
}

/// Store wrapper that counts calls and can be told to fail
pub struct TestStore {
    inner: Store,
    calls: Mutex<HashMap<&'static str, usize>>,
    fail_reassign: AtomicBool,
    fail_notify: AtomicBool,
    fail_comments: AtomicBool,
    fail_watchers: AtomicBool,
    fail_history: AtomicBool,
}

impl TestStore {
    pub fn new(inner: Store) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
            fail_reassign: AtomicBool::new(false),
            fail_notify: AtomicBool::new(false),
            fail_comments: AtomicBool::new(false),
            fail_watchers: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &Store {
        &self.inner
    }

    fn hit(&self, name: &'static str) {
        *self.calls.lock().unwrap().entry(name).or_default() += 1;
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn fail_reassign(&self, fail: bool) {
        self.fail_reassign.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notify(&self, fail: bool) {
        self.fail_notify.store(fail, Ordering::SeqCst);
    }

    pub fn fail_comments(&self, fail: bool) {
        self.fail_comments.store(fail, Ordering::SeqCst);
    }

    pub fn fail_watchers(&self, fail: bool) {
        self.fail_watchers.store(fail, Ordering::SeqCst);
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }
}

fn unavailable(what: &str) -> AppError {
    AppError::Internal(format!("{} unavailable", what))
}

#[async_trait]
impl ActionStore for TestStore {
    async fn create_action(&self, new_action: &NewAction) -> Result<Action> {
        self.hit("create_action");
        self.inner.create_action(new_action).await
    }

    async fn update_action_status(&self, id: Uuid, status: ActionStatus) -> Result<Action> {
        self.hit("update_action_status");
        self.inner.update_action_status(id, status).await
    }

    async fn update_action_description(&self, id: Uuid, description: &str) -> Result<Action> {
        self.hit("update_action_description");
        self.inner.update_action_description(id, description).await
    }

    async fn reassign_action(&self, id: Uuid, assignee: &User) -> Result<()> {
        self.hit("reassign_action");
        if self.fail_reassign.load(Ordering::SeqCst) {
            return Err(unavailable("reassign"));
        }
        self.inner.reassign_action(id, assignee).await
    }

    async fn add_watcher(&self, id: Uuid, user_id: &str) -> Result<()> {
        self.hit("add_watcher");
        if self.fail_watchers.load(Ordering::SeqCst) {
            return Err(unavailable("watchers"));
        }
        self.inner.add_watcher(id, user_id).await
    }

    async fn remove_watcher(&self, id: Uuid, user_id: &str) -> Result<()> {
        self.hit("remove_watcher");
        self.inner.remove_watcher(id, user_id).await
    }

    async fn get_action(&self, id: Uuid) -> Result<Action> {
        self.hit("get_action");
        self.inner.get_action(id).await
    }

    async fn list_actions(&self, user_id: &str) -> Result<Vec<Action>> {
        self.hit("list_actions");
        self.inner.list_actions(user_id).await
    }

    async fn log_history(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry> {
        self.hit("log_history");
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(unavailable("history"));
        }
        self.inner.log_history(entry).await
    }

    async fn get_history(&self, action_id: Uuid, page: u32, page_size: u32) -> Result<HistoryPage> {
        self.hit("get_history");
        self.inner.get_history(action_id, page, page_size).await
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.hit("post_comment");
        if self.fail_comments.load(Ordering::SeqCst) {
            return Err(unavailable("comments"));
        }
        self.inner.post_comment(comment).await
    }

    async fn get_comment(&self, id: Uuid) -> Result<Comment> {
        self.hit("get_comment");
        self.inner.get_comment(id).await
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        self.hit("delete_comment");
        self.inner.delete_comment(id).await
    }

    async fn list_comments(&self, action_id: Uuid) -> Result<Vec<Comment>> {
        self.hit("list_comments");
        self.inner.list_comments(action_id).await
    }

    async fn list_users(&self, workspace: &str, scope: &UserScope) -> Result<Vec<User>> {
        self.hit("list_users");
        self.inner.list_users(workspace, scope).await
    }

    async fn list_streams(&self, workspace: &str) -> Result<Vec<Stream>> {
        self.hit("list_streams");
        self.inner.list_streams(workspace).await
    }

    async fn list_sub_streams(&self, workspace: &str, stream: &str) -> Result<Vec<SubStream>> {
        self.hit("list_sub_streams");
        self.inner.list_sub_streams(workspace, stream).await
    }

    async fn notify_user(&self, notification: &NewNotification) -> Result<Notification> {
        self.hit("notify_user");
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(unavailable("notifications"));
        }
        self.inner.notify_user(notification).await
    }

    async fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.hit("get_notifications");
        self.inner.get_notifications(user_id).await
    }

    async fn mark_all_read(&self, user_id: &str, through: DateTime<Utc>) -> Result<u64> {
        self.hit("mark_all_read");
        self.inner.mark_all_read(user_id, through).await
    }

    async fn delete_notification(&self, id: Uuid) -> Result<()> {
        self.hit("delete_notification");
        self.inner.delete_notification(id).await
    }
}

/// An engine over a seeded database, with the counting store and the push hub
pub struct Harness {
    pub engine: ActionEngine,
    pub store: Arc<TestStore>,
    pub hub: Arc<NotificationHub>,
}

pub async fn harness() -> Harness {
    let pool = setup_pool().await;
    let hub = Arc::new(NotificationHub::new());
    let inner = Store::with_hub(pool, hub.clone());
    seed(&inner).await;

    let store = Arc::new(TestStore::new(inner));
    let engine = ActionEngine::new(store.clone());
    Harness { engine, store, hub }
}
