//! Persistence API and its SQLite implementation
//!
//! The engine only talks to [`ActionStore`]. [`Store`] implements it on top of
//! sqlx and, when given a [`NotificationHub`], pushes every stored
//! notification to the recipient's open sessions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::action::{
    page_bounds, Action, ActionStatus, AttachmentRef, Comment, CommentParent, FieldChange,
    HistoryEntry, HistoryPage, NewAction, NewComment, NewHistoryEntry,
};
use crate::error::{AppError, Result};
use crate::models::{Stream, SubStream, User, UserScope};
use crate::notify::{
    NewNotification, Notification, NotificationHub, NotificationKind, NotificationSubject,
    PushEvent,
};

/// The remote store the engine persists through
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn create_action(&self, new_action: &NewAction) -> Result<Action>;
    async fn update_action_status(&self, id: Uuid, status: ActionStatus) -> Result<Action>;
    async fn update_action_description(&self, id: Uuid, description: &str) -> Result<Action>;
    async fn reassign_action(&self, id: Uuid, assignee: &User) -> Result<()>;
    async fn add_watcher(&self, id: Uuid, user_id: &str) -> Result<()>;
    async fn remove_watcher(&self, id: Uuid, user_id: &str) -> Result<()>;
    async fn get_action(&self, id: Uuid) -> Result<Action>;
    /// Actions the user created, owns, or is in the loop of
    async fn list_actions(&self, user_id: &str) -> Result<Vec<Action>>;

    async fn log_history(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry>;
    /// Newest first; `page` is 1-based
    async fn get_history(&self, action_id: Uuid, page: u32, page_size: u32) -> Result<HistoryPage>;

    async fn post_comment(&self, comment: &NewComment) -> Result<Comment>;
    async fn get_comment(&self, id: Uuid) -> Result<Comment>;
    async fn delete_comment(&self, id: Uuid) -> Result<()>;
    async fn list_comments(&self, action_id: Uuid) -> Result<Vec<Comment>>;

    async fn list_users(&self, workspace: &str, scope: &UserScope) -> Result<Vec<User>>;
    async fn list_streams(&self, workspace: &str) -> Result<Vec<Stream>>;
    async fn list_sub_streams(&self, workspace: &str, stream: &str) -> Result<Vec<SubStream>>;

    async fn notify_user(&self, notification: &NewNotification) -> Result<Notification>;
    /// Newest first
    async fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>>;
    /// Mark unread notifications created at or before `through`; returns how many flipped
    async fn mark_all_read(&self, user_id: &str, through: DateTime<Utc>) -> Result<u64>;
    async fn delete_notification(&self, id: Uuid) -> Result<()>;
}

/// Apply the bundled migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    hub: Option<Arc<NotificationHub>>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, hub: None }
    }

    /// A store that also pushes stored notifications to live sessions
    pub fn with_hub(pool: SqlitePool, hub: Arc<NotificationHub>) -> Self {
        Self {
            pool,
            hub: Some(hub),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Directory administration

    pub async fn add_user(&self, workspace: &str, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (workspace, id, name, role)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (workspace, id) DO UPDATE SET name = excluded.name, role = excluded.role
            "#,
        )
        .bind(workspace)
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.role)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_stream(&self, workspace: &str, stream_title: &str) -> Result<Stream> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO streams (id, workspace, stream_title)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(workspace)
        .bind(stream_title)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_to_conflict(e, format!("Stream {} already exists", stream_title)))?;

        Ok(Stream {
            id,
            stream_title: stream_title.to_string(),
        })
    }

    pub async fn create_sub_stream(
        &self,
        workspace: &str,
        stream_title: &str,
        sub_stream_title: &str,
        description: &str,
    ) -> Result<SubStream> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO sub_streams (id, workspace, stream_title, sub_stream_title, description)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(workspace)
        .bind(stream_title)
        .bind(sub_stream_title)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            unique_to_conflict(
                e,
                format!("Sub-stream {} already exists in {}", sub_stream_title, stream_title),
            )
        })?;

        Ok(SubStream {
            id,
            sub_stream_title: sub_stream_title.to_string(),
            description: description.to_string(),
            stream_title: stream_title.to_string(),
        })
    }

    /// Add a user to a stream, or to one of its sub-streams
    pub async fn add_member(
        &self,
        workspace: &str,
        user_id: &str,
        stream_title: &str,
        sub_stream_title: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO stream_members (workspace, user_id, stream_title, sub_stream_title)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(workspace)
        .bind(user_id)
        .bind(stream_title)
        .bind(sub_stream_title.unwrap_or(""))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn watchers(&self, action_id: Uuid) -> Result<Vec<String>> {
        let watchers = sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id FROM action_watchers
            WHERE action_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(action_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(watchers)
    }

    async fn ensure_action(&self, id: Uuid) -> Result<()> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM actions WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;

        if exists == 0 {
            return Err(AppError::NotFound(format!("Action {} not found", id)));
        }
        Ok(())
    }
}

fn unique_to_conflict(err: sqlx::Error, message: String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message),
        _ => AppError::Database(err),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(format!("Invalid JSON: {}", e)))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| AppError::Internal(format!("Invalid {}: {}", what, e)))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Internal(format!("Invalid UUID: {}", e)))
}

#[async_trait]
impl ActionStore for Store {
    async fn create_action(&self, new_action: &NewAction) -> Result<Action> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = ActionStatus::Pending;

        sqlx::query(
            r#"
            INSERT INTO actions (id, workspace, title, description, creator, creator_name, creator_role,
                                 assignee, assignee_name, stream, sub_streams, status, priority,
                                 expected_completion_date, created_date, attachments)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_action.workspace)
        .bind(&new_action.title)
        .bind(&new_action.description)
        .bind(&new_action.creator.id)
        .bind(&new_action.creator.name)
        .bind(&new_action.creator.role)
        .bind(&new_action.assignee.id)
        .bind(&new_action.assignee.name)
        .bind(&new_action.stream)
        .bind(to_json(&new_action.sub_streams)?)
        .bind(status.as_str())
        .bind(new_action.priority.as_str())
        .bind(new_action.expected_completion_date)
        .bind(now)
        .bind(to_json(&new_action.attachments)?)
        .execute(&self.pool)
        .await?;

        Ok(Action {
            id,
            workspace: new_action.workspace.clone(),
            title: new_action.title.clone(),
            description: new_action.description.clone(),
            creator: new_action.creator.id.clone(),
            creator_name: new_action.creator.name.clone(),
            creator_role: new_action.creator.role.clone(),
            assignee: Some(new_action.assignee.id.clone()),
            assignee_name: Some(new_action.assignee.name.clone()),
            sub_assigned: Vec::new(),
            stream: new_action.stream.clone(),
            sub_streams: new_action.sub_streams.clone(),
            status,
            priority: new_action.priority,
            expected_completion_date: new_action.expected_completion_date,
            created_date: now,
            attachments: new_action.attachments.clone(),
        })
    }

    async fn update_action_status(&self, id: Uuid, status: ActionStatus) -> Result<Action> {
        let result = sqlx::query("UPDATE actions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Action {} not found", id)));
        }
        self.get_action(id).await
    }

    async fn update_action_description(&self, id: Uuid, description: &str) -> Result<Action> {
        let result = sqlx::query("UPDATE actions SET description = ? WHERE id = ?")
            .bind(description)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Action {} not found", id)));
        }
        self.get_action(id).await
    }

    async fn reassign_action(&self, id: Uuid, assignee: &User) -> Result<()> {
        let result = sqlx::query("UPDATE actions SET assignee = ?, assignee_name = ? WHERE id = ?")
            .bind(&assignee.id)
            .bind(&assignee.name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Action {} not found", id)));
        }
        Ok(())
    }

    async fn add_watcher(&self, id: Uuid, user_id: &str) -> Result<()> {
        self.ensure_action(id).await?;

        sqlx::query("INSERT INTO action_watchers (action_id, user_id) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_to_conflict(e, format!("{} is already in the loop", user_id)))?;

        Ok(())
    }

    async fn remove_watcher(&self, id: Uuid, user_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM action_watchers WHERE action_id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "{} is not in the loop of action {}",
                user_id, id
            )));
        }
        Ok(())
    }

    async fn get_action(&self, id: Uuid) -> Result<Action> {
        let row = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT id, workspace, title, description, creator, creator_name, creator_role,
                   assignee, assignee_name, stream, sub_streams, status, priority,
                   expected_completion_date, created_date, attachments
            FROM actions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Action {} not found", id)))?;

        let watchers = self.watchers(id).await?;
        row.into_action(watchers)
    }

    async fn list_actions(&self, user_id: &str) -> Result<Vec<Action>> {
        let rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT id, workspace, title, description, creator, creator_name, creator_role,
                   assignee, assignee_name, stream, sub_streams, status, priority,
                   expected_completion_date, created_date, attachments
            FROM actions
            WHERE creator = ?1
               OR assignee = ?1
               OR EXISTS (SELECT 1 FROM action_watchers w WHERE w.action_id = actions.id AND w.user_id = ?1)
            ORDER BY created_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut actions = Vec::with_capacity(rows.len());
        for row in rows {
            let watchers = self.watchers(parse_uuid(&row.id)?).await?;
            actions.push(row.into_action(watchers)?);
        }
        Ok(actions)
    }

    async fn log_history(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO history_entries (id, action_id, modified_by, modified_by_name, role, changes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(entry.action_id.to_string())
        .bind(&entry.modified_by)
        .bind(&entry.modified_by_name)
        .bind(&entry.role)
        .bind(to_json(&entry.changes)?)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(HistoryEntry {
            id,
            action_id: entry.action_id,
            modified_by: entry.modified_by.clone(),
            modified_by_name: entry.modified_by_name.clone(),
            role: entry.role.clone(),
            changes: entry.changes.clone(),
            created_at: now,
        })
    }

    async fn get_history(&self, action_id: Uuid, page: u32, page_size: u32) -> Result<HistoryPage> {
        let (offset, limit) = page_bounds(page, page_size);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM history_entries WHERE action_id = ?",
        )
        .bind(action_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, action_id, modified_by, modified_by_name, role, changes, created_at
            FROM history_entries
            WHERE action_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(action_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let data = rows
            .into_iter()
            .map(|r| r.try_into())
            .collect::<Result<Vec<HistoryEntry>>>()?;

        Ok(HistoryPage {
            data,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<Comment> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO comments (id, action_id, description, created_by, created_by_name, role, parent_comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(comment.action_id.to_string())
        .bind(&comment.description)
        .bind(&comment.created_by)
        .bind(&comment.created_by_name)
        .bind(&comment.role)
        .bind(comment.parent_comment.parent_id().map(|u| u.to_string()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id,
            action_id: comment.action_id,
            description: comment.description.clone(),
            created_by: comment.created_by.clone(),
            created_by_name: comment.created_by_name.clone(),
            role: comment.role.clone(),
            parent_comment: comment.parent_comment,
            created_at: now,
        })
    }

    async fn get_comment(&self, id: Uuid) -> Result<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, action_id, description, created_by, created_by_name, role, parent_comment, created_at
            FROM comments
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))?;

        row.try_into()
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {} not found", id)));
        }
        Ok(())
    }

    async fn list_comments(&self, action_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, action_id, description, created_by, created_by_name, role, parent_comment, created_at
            FROM comments
            WHERE action_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(action_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn list_users(&self, workspace: &str, scope: &UserScope) -> Result<Vec<User>> {
        let users = match scope {
            UserScope::Workspace => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, name, role FROM users
                    WHERE workspace = ?
                    ORDER BY name ASC
                    "#,
                )
                .bind(workspace)
                .fetch_all(&self.pool)
                .await?
            }
            UserScope::Stream { stream } => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT DISTINCT u.id, u.name, u.role
                    FROM users u
                    JOIN stream_members m ON m.workspace = u.workspace AND m.user_id = u.id
                    WHERE u.workspace = ? AND m.stream_title = ?
                    ORDER BY u.name ASC
                    "#,
                )
                .bind(workspace)
                .bind(stream)
                .fetch_all(&self.pool)
                .await?
            }
            UserScope::SubStreams {
                stream,
                sub_streams,
            } => {
                let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
                    "SELECT DISTINCT u.id, u.name, u.role FROM users u \
                     JOIN stream_members m ON m.workspace = u.workspace AND m.user_id = u.id \
                     WHERE u.workspace = ",
                );
                query.push_bind(workspace);
                query.push(" AND m.stream_title = ");
                query.push_bind(stream);
                query.push(" AND m.sub_stream_title IN (");
                let mut titles = query.separated(", ");
                for title in sub_streams {
                    titles.push_bind(title);
                }
                titles.push_unseparated(") ORDER BY u.name ASC");

                query
                    .build_query_as::<UserRow>()
                    .fetch_all(&self.pool)
                    .await?
            }
            UserScope::Unassigned => {
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT id, name, role FROM users u
                    WHERE workspace = ?
                      AND NOT EXISTS (
                          SELECT 1 FROM stream_members m
                          WHERE m.workspace = u.workspace AND m.user_id = u.id
                      )
                    ORDER BY name ASC
                    "#,
                )
                .bind(workspace)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(users.into_iter().map(User::from).collect())
    }

    async fn list_streams(&self, workspace: &str) -> Result<Vec<Stream>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT id, stream_title FROM streams
            WHERE workspace = ?
            ORDER BY stream_title ASC
            "#,
        )
        .bind(workspace)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, stream_title)| {
                Ok(Stream {
                    id: parse_uuid(&id)?,
                    stream_title,
                })
            })
            .collect()
    }

    async fn list_sub_streams(&self, workspace: &str, stream: &str) -> Result<Vec<SubStream>> {
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            r#"
            SELECT id, sub_stream_title, description, stream_title FROM sub_streams
            WHERE workspace = ? AND stream_title = ?
            ORDER BY sub_stream_title ASC
            "#,
        )
        .bind(workspace)
        .bind(stream)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, sub_stream_title, description, stream_title)| {
                Ok(SubStream {
                    id: parse_uuid(&id)?,
                    sub_stream_title,
                    description,
                    stream_title,
                })
            })
            .collect()
    }

    async fn notify_user(&self, new_notification: &NewNotification) -> Result<Notification> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let (subject_kind, subject_id) = match new_notification.subject {
            NotificationSubject::Action(id) => ("action", id),
            NotificationSubject::Survey(id) => ("survey", id),
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, subject_kind, subject_id, title, created_by_name, read, notification_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_notification.user_id)
        .bind(subject_kind)
        .bind(subject_id.to_string())
        .bind(&new_notification.title)
        .bind(&new_notification.created_by_name)
        .bind(new_notification.notification_type.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let notification = Notification {
            id,
            user_id: new_notification.user_id.clone(),
            subject: new_notification.subject,
            title: new_notification.title.clone(),
            created_by_name: new_notification.created_by_name.clone(),
            read: false,
            notification_type: new_notification.notification_type,
            created_at: now,
        };

        if let Some(hub) = &self.hub {
            let delivered = hub
                .publish(
                    &notification.user_id,
                    PushEvent {
                        event: new_notification.event,
                        notification: notification.clone(),
                    },
                )
                .await;
            tracing::debug!(
                user_id = %notification.user_id,
                event = new_notification.event.as_str(),
                sessions = delivered,
                "Notification pushed"
            );
        }

        Ok(notification)
    }

    async fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, subject_kind, subject_id, title, created_by_name, read, notification_type, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn mark_all_read(&self, user_id: &str, through: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET read = 1
            WHERE user_id = ? AND read = 0 AND created_at <= ?
            "#,
        )
        .bind(user_id)
        .bind(through)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct ActionRow {
    id: String,
    workspace: String,
    title: String,
    description: String,
    creator: String,
    creator_name: String,
    creator_role: String,
    assignee: Option<String>,
    assignee_name: Option<String>,
    stream: String,
    sub_streams: String,
    status: String,
    priority: String,
    expected_completion_date: NaiveDate,
    created_date: DateTime<Utc>,
    attachments: String,
}

impl ActionRow {
    fn into_action(self, sub_assigned: Vec<String>) -> Result<Action> {
        Ok(Action {
            id: parse_uuid(&self.id)?,
            workspace: self.workspace,
            title: self.title,
            description: self.description,
            creator: self.creator,
            creator_name: self.creator_name,
            creator_role: self.creator_role,
            assignee: self.assignee,
            assignee_name: self.assignee_name,
            sub_assigned,
            stream: self.stream,
            sub_streams: from_json(&self.sub_streams, "sub_streams")?,
            status: self
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))?,
            priority: self
                .priority
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid priority: {}", e)))?,
            expected_completion_date: self.expected_completion_date,
            created_date: self.created_date,
            attachments: from_json::<Vec<AttachmentRef>>(&self.attachments, "attachments")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    action_id: String,
    modified_by: String,
    modified_by_name: String,
    role: String,
    changes: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(HistoryEntry {
            id: parse_uuid(&row.id)?,
            action_id: parse_uuid(&row.action_id)?,
            modified_by: row.modified_by,
            modified_by_name: row.modified_by_name,
            role: row.role,
            changes: from_json::<Vec<FieldChange>>(&row.changes, "history changes")?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    action_id: String,
    description: String,
    created_by: String,
    created_by_name: String,
    role: String,
    parent_comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = AppError;

    fn try_from(row: CommentRow) -> Result<Self> {
        let parent = row.parent_comment.as_deref().map(parse_uuid).transpose()?;

        Ok(Comment {
            id: parse_uuid(&row.id)?,
            action_id: parse_uuid(&row.action_id)?,
            description: row.description,
            created_by: row.created_by,
            created_by_name: row.created_by_name,
            role: row.role,
            parent_comment: CommentParent::from(parent),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    role: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            role: row.role,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    subject_kind: String,
    subject_id: String,
    title: String,
    created_by_name: String,
    read: bool,
    notification_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        let subject_id = parse_uuid(&row.subject_id)?;
        let subject = match row.subject_kind.as_str() {
            "action" => NotificationSubject::Action(subject_id),
            "survey" => NotificationSubject::Survey(subject_id),
            other => {
                return Err(AppError::Internal(format!(
                    "Invalid notification subject: {}",
                    other
                )))
            }
        };

        Ok(Notification {
            id: parse_uuid(&row.id)?,
            user_id: row.user_id,
            subject,
            title: row.title,
            created_by_name: row.created_by_name,
            read: row.read,
            notification_type: row
                .notification_type
                .parse::<NotificationKind>()
                .map_err(AppError::Internal)?,
            created_at: row.created_at,
        })
    }
}
