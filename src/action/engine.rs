//! Action engine: every operation on actions, their loop, comments and
//! notifications
//!
//! The engine validates, authorizes and sequences. Persistence goes through
//! [`ActionStore`]; notification delivery is a follow-up whose failure is
//! logged and reported but never undoes the mutation that caused it.
//! Mutations on one action are serialized so its history is appended in the
//! order the store confirmed them. Once the store has accepted a mutation,
//! its history entry and change event are always attempted.
//!
//! Reads only see actions in the actor's workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::access::{self, Capability};
use super::comment::{assemble_thread, Comment, CommentParent, NewComment, ThreadNode};
use super::confirm::{Confirmations, Proposal};
use super::entity::{Action, ActionDraft, ActionStatus};
use super::history::{FieldChange, HistoryPage, NewHistoryEntry};
use crate::directory::StreamDirectory;
use crate::error::{AppError, Field, Result, ValidationError};
use crate::models::{ActorContext, User, UserId};
use crate::notify::{NewNotification, Notification};
use crate::store::ActionStore;

/// Changes broadcast so dependent action lists can refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ActionEvent {
    Created {
        workspace: String,
        action_id: Uuid,
    },
    StatusChanged {
        workspace: String,
        action_id: Uuid,
        status: ActionStatus,
    },
    DescriptionChanged {
        workspace: String,
        action_id: Uuid,
    },
    Reassigned {
        workspace: String,
        action_id: Uuid,
        assignee: UserId,
    },
    LoopChanged {
        workspace: String,
        action_id: Uuid,
        sub_assigned: Vec<UserId>,
    },
    CommentPosted {
        workspace: String,
        action_id: Uuid,
        comment_id: Uuid,
    },
    CommentsDeleted {
        workspace: String,
        action_id: Uuid,
        comment_ids: Vec<Uuid>,
    },
}

impl ActionEvent {
    pub fn workspace(&self) -> &str {
        match self {
            ActionEvent::Created { workspace, .. }
            | ActionEvent::StatusChanged { workspace, .. }
            | ActionEvent::DescriptionChanged { workspace, .. }
            | ActionEvent::Reassigned { workspace, .. }
            | ActionEvent::LoopChanged { workspace, .. }
            | ActionEvent::CommentPosted { workspace, .. }
            | ActionEvent::CommentsDeleted { workspace, .. } => workspace,
        }
    }

    pub fn action_id(&self) -> Uuid {
        match self {
            ActionEvent::Created { action_id, .. }
            | ActionEvent::StatusChanged { action_id, .. }
            | ActionEvent::DescriptionChanged { action_id, .. }
            | ActionEvent::Reassigned { action_id, .. }
            | ActionEvent::LoopChanged { action_id, .. }
            | ActionEvent::CommentPosted { action_id, .. }
            | ActionEvent::CommentsDeleted { action_id, .. } => *action_id,
        }
    }
}

/// Outcome of a notification follow-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "delivery", rename_all = "snake_case")]
pub enum Delivery {
    Sent { notification: Notification },
    Failed { error: String },
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent { .. })
    }
}

/// Result of `create_action`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedAction {
    pub action: Action,
    pub notification: Delivery,
    /// `None` when no initial comment was given or posting it failed
    pub initial_comment: Option<Comment>,
}

/// A staged change of assignee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reassignment {
    pub action_id: Uuid,
    pub assignee: User,
}

pub type ReassignmentProposal = Proposal<Reassignment>;

/// How putting a new assignee in the loop went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loop_in", rename_all = "snake_case")]
pub enum LoopIn {
    Added,
    AlreadyIn,
    /// The assignee changed but the loop did not
    Failed { error: String },
}

/// A reassignment the store accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedReassignment {
    pub action: Action,
    pub loop_in: LoopIn,
    pub notification: Delivery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReassignOutcome {
    /// Written, either confirmed or because the action had no assignee
    Applied(AppliedReassignment),
    NeedsConfirmation { proposal: ReassignmentProposal },
}

/// A staged comment deletion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDeletion {
    pub action_id: Uuid,
    pub comment_id: Uuid,
}

pub type DeletionProposal = Proposal<CommentDeletion>;

type LockTable = std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>;

/// Holds one action's mutex; the table entry is dropped with its last holder
struct ActionLock<'a> {
    table: &'a LockTable,
    action_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ActionLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table
            .get(&self.action_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.action_id);
        }
    }
}

/// Coordinates action operations across the store, the directory and listeners
pub struct ActionEngine {
    store: Arc<dyn ActionStore>,
    directory: StreamDirectory,
    reassignments: Confirmations<Reassignment>,
    deletions: Confirmations<CommentDeletion>,
    /// One async mutex per action currently being mutated or waited on
    locks: LockTable,
    event_tx: broadcast::Sender<ActionEvent>,
}

impl ActionEngine {
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            directory: StreamDirectory::new(store.clone()),
            store,
            reassignments: Confirmations::new("reassignment"),
            deletions: Confirmations::new("comment deletion"),
            locks: std::sync::Mutex::new(HashMap::new()),
            event_tx,
        }
    }

    /// Subscribe to action change events
    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.event_tx.subscribe()
    }

    pub fn directory(&self) -> &StreamDirectory {
        &self.directory
    }

    async fn lock(&self, action_id: Uuid) -> ActionLock<'_> {
        let lock = {
            let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            table.entry(action_id).or_default().clone()
        };
        // Built before awaiting so a cancelled wait still evicts the entry
        let mut held = ActionLock {
            table: &self.locks,
            action_id,
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Actions with a held or awaited mutation lock
    pub fn locked_actions(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// An action the actor may read: one in the actor's workspace
    async fn visible_action(&self, action_id: Uuid, actor: &ActorContext) -> Result<Action> {
        let action = self.store.get_action(action_id).await?;
        if action.workspace != actor.workspace {
            return Err(AppError::NotFound(format!("Action {} not found", action_id)));
        }
        Ok(action)
    }

    fn emit(&self, event: ActionEvent) {
        // No listeners is fine
        let _ = self.event_tx.send(event);
    }

    async fn deliver(&self, notification: NewNotification) -> Delivery {
        match self.store.notify_user(&notification).await {
            Ok(notification) => Delivery::Sent { notification },
            Err(e) => {
                tracing::warn!(
                    user_id = %notification.user_id,
                    event = notification.event.as_str(),
                    "Notification delivery failed: {}",
                    e
                );
                Delivery::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Append one history entry; failures are logged and returned
    async fn record(
        &self,
        actor: &ActorContext,
        action_id: Uuid,
        changes: Vec<FieldChange>,
    ) -> Result<()> {
        match self
            .store
            .log_history(&NewHistoryEntry::by(actor, action_id, changes))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(action_id = %action_id, "History entry not written: {}", e);
                Err(e)
            }
        }
    }

    // Creation

    /// Validate a draft, persist it, then notify the assignee and post the
    /// optional initial comment
    ///
    /// Nothing reaches the store until every required field is present.
    pub async fn create_action(
        &self,
        draft: ActionDraft,
        actor: &ActorContext,
    ) -> Result<CreatedAction> {
        let new_action = draft.validate(actor)?;

        if !self
            .directory
            .is_eligible(actor, &new_action.selection(), &new_action.assignee.id)
            .await?
        {
            return Err(ValidationError::AssigneeNotEligible {
                user_id: new_action.assignee.id.clone(),
                stream: new_action.stream.clone(),
            }
            .into());
        }

        let action = self.store.create_action(&new_action).await?;
        tracing::info!(
            action_id = %action.id,
            assignee = %new_action.assignee.id,
            priority = action.priority.as_str(),
            "Action created"
        );
        self.emit(ActionEvent::Created {
            workspace: action.workspace.clone(),
            action_id: action.id,
        });

        let notification = self
            .deliver(NewNotification::assignment(
                &action,
                &new_action.assignee.id,
                actor,
            ))
            .await;

        let initial_comment = match draft
            .initial_comment
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            Some(text) => {
                let comment = NewComment::by(actor, action.id, text, CommentParent::Root);
                match self.store.post_comment(&comment).await {
                    Ok(comment) => Some(comment),
                    Err(e) => {
                        tracing::warn!(action_id = %action.id, "Initial comment failed: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(CreatedAction {
            action,
            notification,
            initial_comment,
        })
    }

    pub async fn get_action(&self, action_id: Uuid, actor: &ActorContext) -> Result<Action> {
        self.visible_action(action_id, actor).await
    }

    /// Actions the actor created, owns, or watches
    pub async fn list_actions(&self, actor: &ActorContext) -> Result<Vec<Action>> {
        self.store.list_actions(&actor.user_id).await
    }

    // Lifecycle edits

    /// Set any status; setting the current one changes nothing
    pub async fn update_status(
        &self,
        action_id: Uuid,
        status: ActionStatus,
        actor: &ActorContext,
    ) -> Result<Action> {
        let _guard = self.lock(action_id).await;
        let action = self.store.get_action(action_id).await?;
        access::require(&action, actor, Capability::Edit)?;

        if action.status == status {
            return Ok(action);
        }

        let updated = self.store.update_action_status(action_id, status).await?;
        let recorded = self
            .record(
                actor,
                action_id,
                vec![FieldChange::status(action.status.as_str(), status.as_str())],
            )
            .await;

        tracing::info!(
            action_id = %action_id,
            from = action.status.as_str(),
            to = status.as_str(),
            "Status changed"
        );
        self.emit(ActionEvent::StatusChanged {
            workspace: updated.workspace.clone(),
            action_id,
            status,
        });
        recorded.map(|()| updated)
    }

    pub async fn update_description(
        &self,
        action_id: Uuid,
        description: &str,
        actor: &ActorContext,
    ) -> Result<Action> {
        if description.trim().is_empty() {
            return Err(ValidationError::MissingField(Field::Description).into());
        }

        let _guard = self.lock(action_id).await;
        let action = self.store.get_action(action_id).await?;
        access::require(&action, actor, Capability::Edit)?;

        if action.description == description {
            return Ok(action);
        }

        let updated = self
            .store
            .update_action_description(action_id, description)
            .await?;
        let recorded = self
            .record(
                actor,
                action_id,
                vec![FieldChange::description(&action.description, description)],
            )
            .await;

        tracing::info!(action_id = %action_id, "Description changed");
        self.emit(ActionEvent::DescriptionChanged {
            workspace: updated.workspace.clone(),
            action_id,
        });
        recorded.map(|()| updated)
    }

    // Reassignment

    /// Start assigning the action to someone else
    ///
    /// An action without an assignee is assigned at once. Otherwise the change
    /// is staged and applies only on `confirm_reassignment`.
    pub async fn propose_reassignment(
        &self,
        action_id: Uuid,
        assignee: User,
        actor: &ActorContext,
    ) -> Result<ReassignOutcome> {
        let action = self.store.get_action(action_id).await?;
        access::require(&action, actor, Capability::Reassign)?;
        self.ensure_eligible(&action, &assignee, actor).await?;

        if !action.has_assignee() {
            let applied = self.reassign_and_watch(action_id, &assignee, actor).await?;
            return Ok(ReassignOutcome::Applied(applied));
        }

        let proposal = self
            .reassignments
            .propose(actor, Reassignment { action_id, assignee })
            .await;
        tracing::debug!(
            action_id = %action_id,
            proposal_id = %proposal.id,
            "Reassignment awaiting confirmation"
        );
        Ok(ReassignOutcome::NeedsConfirmation { proposal })
    }

    /// Apply a staged reassignment; only its proposer may confirm
    ///
    /// The proposal is consumed even when persisting fails, in which case the
    /// stored assignee is unchanged.
    pub async fn confirm_reassignment(
        &self,
        proposal_id: Uuid,
        actor: &ActorContext,
    ) -> Result<AppliedReassignment> {
        let proposal = self.reassignments.take(proposal_id, actor).await?;
        let Reassignment {
            action_id,
            assignee,
        } = proposal.payload;
        self.reassign_and_watch(action_id, &assignee, actor).await
    }

    pub async fn cancel_reassignment(
        &self,
        proposal_id: Uuid,
        actor: &ActorContext,
    ) -> Result<ReassignmentProposal> {
        self.reassignments.cancel(proposal_id, actor).await
    }

    pub async fn pending_reassignment(&self, proposal_id: Uuid) -> Option<ReassignmentProposal> {
        self.reassignments.get(proposal_id).await
    }

    async fn ensure_eligible(
        &self,
        action: &Action,
        assignee: &User,
        actor: &ActorContext,
    ) -> Result<()> {
        if assignee.id.trim().is_empty() {
            return Err(ValidationError::MissingField(Field::Assignee).into());
        }
        if !self
            .directory
            .is_eligible(actor, &action.selection(), &assignee.id)
            .await?
        {
            return Err(ValidationError::AssigneeNotEligible {
                user_id: assignee.id.clone(),
                stream: action.stream.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Make `assignee` the owner and put them in the loop
    ///
    /// Once the assignee is stored, one history entry is written covering it
    /// and, when the loop-in also succeeded, the loop. A failed loop-in is
    /// reported in the result rather than as an error. The returned action is
    /// derived from the writes the store accepted.
    pub async fn reassign_and_watch(
        &self,
        action_id: Uuid,
        assignee: &User,
        actor: &ActorContext,
    ) -> Result<AppliedReassignment> {
        let _guard = self.lock(action_id).await;
        let before = self.store.get_action(action_id).await?;
        access::require(&before, actor, Capability::Reassign)?;

        self.store.reassign_action(action_id, assignee).await?;

        let loop_in = if before.in_loop(&assignee.id) {
            LoopIn::AlreadyIn
        } else {
            match self.store.add_watcher(action_id, &assignee.id).await {
                Ok(()) => LoopIn::Added,
                Err(AppError::Conflict(_)) => LoopIn::AlreadyIn,
                Err(e) => {
                    tracing::warn!(
                        action_id = %action_id,
                        user_id = %assignee.id,
                        "Loop-in after reassignment failed: {}",
                        e
                    );
                    LoopIn::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };

        let mut after = before.clone();
        after.assignee = Some(assignee.id.clone());
        after.assignee_name = Some(assignee.name.clone());
        if !matches!(loop_in, LoopIn::Failed { .. }) && !after.in_loop(&assignee.id) {
            after.sub_assigned.push(assignee.id.clone());
        }

        let mut changes = vec![FieldChange::assignee(
            before.assignee.as_deref(),
            &assignee.id,
        )];
        if before.sub_assigned != after.sub_assigned {
            changes.push(FieldChange::sub_assigned(
                &before.sub_assigned,
                &after.sub_assigned,
            ));
        }
        let recorded = self.record(actor, action_id, changes).await;

        tracing::info!(
            action_id = %action_id,
            from = before.assignee.as_deref().unwrap_or("-"),
            to = %assignee.id,
            "Action reassigned"
        );
        self.emit(ActionEvent::Reassigned {
            workspace: after.workspace.clone(),
            action_id,
            assignee: assignee.id.clone(),
        });

        let notification = self
            .deliver(NewNotification::assignment(&after, &assignee.id, actor))
            .await;
        recorded?;

        Ok(AppliedReassignment {
            action: after,
            loop_in,
            notification,
        })
    }

    // Loop

    /// Add a watcher; a user already in the loop is a conflict
    pub async fn add_to_loop(
        &self,
        action_id: Uuid,
        user_id: Option<&str>,
        actor: &ActorContext,
    ) -> Result<Action> {
        let user_id = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingField(Field::LoopMember))?;

        let _guard = self.lock(action_id).await;
        let before = self.store.get_action(action_id).await?;
        access::require(&before, actor, Capability::ManageLoop)?;

        if before.in_loop(user_id) {
            return Err(AppError::Conflict(format!(
                "{} is already in the loop",
                user_id
            )));
        }

        self.store.add_watcher(action_id, user_id).await?;
        let mut after = before.clone();
        after.sub_assigned.push(user_id.to_string());
        let recorded = self
            .record(
                actor,
                action_id,
                vec![FieldChange::sub_assigned(
                    &before.sub_assigned,
                    &after.sub_assigned,
                )],
            )
            .await;

        tracing::info!(action_id = %action_id, user_id, "Added to loop");
        self.emit(ActionEvent::LoopChanged {
            workspace: after.workspace.clone(),
            action_id,
            sub_assigned: after.sub_assigned.clone(),
        });

        self.deliver(NewNotification::loop_in(&after, user_id, actor))
            .await;
        recorded.map(|()| after)
    }

    pub async fn remove_from_loop(
        &self,
        action_id: Uuid,
        user_id: &str,
        actor: &ActorContext,
    ) -> Result<Action> {
        let _guard = self.lock(action_id).await;
        let before = self.store.get_action(action_id).await?;
        access::require(&before, actor, Capability::ManageLoop)?;

        if !before.in_loop(user_id) {
            return Err(AppError::Conflict(format!("{} is not in the loop", user_id)));
        }

        self.store.remove_watcher(action_id, user_id).await?;
        let mut after = before.clone();
        after.sub_assigned.retain(|id| id != user_id);
        let recorded = self
            .record(
                actor,
                action_id,
                vec![FieldChange::sub_assigned(
                    &before.sub_assigned,
                    &after.sub_assigned,
                )],
            )
            .await;

        tracing::info!(action_id = %action_id, user_id, "Removed from loop");
        self.emit(ActionEvent::LoopChanged {
            workspace: after.workspace.clone(),
            action_id,
            sub_assigned: after.sub_assigned.clone(),
        });
        recorded.map(|()| after)
    }

    // Comments

    /// Post a root comment; blank text is ignored
    pub async fn post_comment(
        &self,
        action_id: Uuid,
        text: &str,
        actor: &ActorContext,
    ) -> Result<Option<Comment>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let action = self.store.get_action(action_id).await?;
        access::require(&action, actor, Capability::Comment)?;

        let comment = self
            .store
            .post_comment(&NewComment::by(actor, action_id, text, CommentParent::Root))
            .await?;

        tracing::info!(action_id = %action_id, comment_id = %comment.id, "Comment posted");
        self.emit(ActionEvent::CommentPosted {
            workspace: action.workspace,
            action_id,
            comment_id: comment.id,
        });
        Ok(Some(comment))
    }

    /// Reply to a root comment and tell its author
    pub async fn post_reply(
        &self,
        comment_id: Uuid,
        text: &str,
        actor: &ActorContext,
    ) -> Result<Option<Comment>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let parent = self.store.get_comment(comment_id).await?;
        if !parent.parent_comment.is_root() {
            return Err(AppError::Conflict(format!(
                "Comment {} is already a reply",
                comment_id
            )));
        }

        let action = self.store.get_action(parent.action_id).await?;
        access::require(&action, actor, Capability::Comment)?;

        let reply = self
            .store
            .post_comment(&NewComment::by(
                actor,
                action.id,
                text,
                CommentParent::Reply(parent.id),
            ))
            .await?;

        tracing::info!(
            action_id = %action.id,
            comment_id = %reply.id,
            parent_id = %parent.id,
            "Reply posted"
        );
        self.emit(ActionEvent::CommentPosted {
            workspace: action.workspace.clone(),
            action_id: action.id,
            comment_id: reply.id,
        });

        if parent.created_by != actor.user_id {
            self.deliver(NewNotification::comment_reply(
                &action,
                &parent.created_by,
                actor,
            ))
            .await;
        }
        Ok(Some(reply))
    }

    /// Stage the deletion of a comment; only its author or an admin may
    pub async fn request_comment_deletion(
        &self,
        comment_id: Uuid,
        actor: &ActorContext,
    ) -> Result<DeletionProposal> {
        let comment = self.store.get_comment(comment_id).await?;
        let action = self.store.get_action(comment.action_id).await?;
        if action.workspace != actor.workspace
            || (comment.created_by != actor.user_id && !actor.is_admin())
        {
            return Err(AppError::NotAuthorized(format!(
                "{} may not delete comment {}",
                actor.user_id, comment_id
            )));
        }

        Ok(self
            .deletions
            .propose(
                actor,
                CommentDeletion {
                    action_id: comment.action_id,
                    comment_id,
                },
            )
            .await)
    }

    /// Delete a staged comment, replies first when it is a root
    ///
    /// Returns the ids that were removed.
    pub async fn confirm_comment_deletion(
        &self,
        proposal_id: Uuid,
        actor: &ActorContext,
    ) -> Result<Vec<Uuid>> {
        let proposal = self.deletions.take(proposal_id, actor).await?;
        let CommentDeletion {
            action_id,
            comment_id,
        } = proposal.payload;

        let _guard = self.lock(action_id).await;
        let comment = self.store.get_comment(comment_id).await?;

        let mut deleted = Vec::new();
        if comment.parent_comment.is_root() {
            let replies = self
                .store
                .list_comments(action_id)
                .await?
                .into_iter()
                .filter(|c| c.parent_comment == CommentParent::Reply(comment_id));
            for reply in replies {
                self.store.delete_comment(reply.id).await?;
                deleted.push(reply.id);
            }
        }
        self.store.delete_comment(comment_id).await?;
        deleted.push(comment_id);

        tracing::info!(
            action_id = %action_id,
            comment_id = %comment_id,
            removed = deleted.len(),
            "Comment deleted"
        );
        let action = self.store.get_action(action_id).await?;
        self.emit(ActionEvent::CommentsDeleted {
            workspace: action.workspace,
            action_id,
            comment_ids: deleted.clone(),
        });
        Ok(deleted)
    }

    pub async fn cancel_comment_deletion(
        &self,
        proposal_id: Uuid,
        actor: &ActorContext,
    ) -> Result<DeletionProposal> {
        self.deletions.cancel(proposal_id, actor).await
    }

    /// Roots with their replies, mentions resolved against the workspace
    pub async fn comment_thread(
        &self,
        action_id: Uuid,
        actor: &ActorContext,
    ) -> Result<Vec<ThreadNode>> {
        self.visible_action(action_id, actor).await?;
        let comments = self.store.list_comments(action_id).await?;
        let members = self.directory.workspace_members(actor).await?;
        Ok(assemble_thread(comments, &members))
    }

    // History

    pub async fn history(
        &self,
        action_id: Uuid,
        page: u32,
        page_size: u32,
        actor: &ActorContext,
    ) -> Result<HistoryPage> {
        self.visible_action(action_id, actor).await?;
        self.store.get_history(action_id, page, page_size).await
    }

    // Notifications

    /// Tell each recipient a survey was launched
    pub async fn announce_survey(
        &self,
        survey_id: Uuid,
        title: &str,
        recipients: &[UserId],
        actor: &ActorContext,
    ) -> Result<Vec<Delivery>> {
        if title.trim().is_empty() {
            return Err(ValidationError::MissingField(Field::Title).into());
        }

        let mut deliveries = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            deliveries.push(
                self.deliver(NewNotification::survey_launch(
                    survey_id, title, recipient, actor,
                ))
                .await,
            );
        }
        tracing::info!(
            survey_id = %survey_id,
            recipients = recipients.len(),
            failed = deliveries.iter().filter(|d| !d.is_sent()).count(),
            "Survey announced"
        );
        Ok(deliveries)
    }

    pub async fn notifications(&self, actor: &ActorContext) -> Result<Vec<Notification>> {
        self.store.get_notifications(&actor.user_id).await
    }

    /// Mark the actor's notifications created up to `through` as read
    pub async fn mark_all_read(
        &self,
        actor: &ActorContext,
        through: DateTime<Utc>,
    ) -> Result<u64> {
        let marked = self.store.mark_all_read(&actor.user_id, through).await?;
        tracing::debug!(user_id = %actor.user_id, marked, "Notifications marked read");
        Ok(marked)
    }

    /// Delete one of the actor's own notifications
    pub async fn delete_notification(&self, id: Uuid, actor: &ActorContext) -> Result<()> {
        let owned = self
            .store
            .get_notifications(&actor.user_id)
            .await?
            .iter()
            .any(|n| n.id == id);
        if !owned {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        self.store.delete_notification(id).await
    }
}
