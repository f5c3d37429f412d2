//! Stream and sub-stream directory
//!
//! Streams scope which users can be picked as an assignee. Two reserved keys
//! are resolved here instead of in the store: `Personal_Stream` (the actor
//! alone) and `unassigned_users` (users without any stream membership).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    ActorContext, Stream, SubStream, User, UserScope, PERSONAL_STREAM, UNASSIGNED_USERS,
};
use crate::store::ActionStore;

/// The stream/sub-stream choice made while drafting or reassigning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSelection {
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub sub_streams: Vec<String>,
}

/// A selection with a concrete stream key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub stream: String,
    pub sub_streams: Vec<String>,
}

impl StreamSelection {
    pub fn personal() -> Self {
        Self {
            stream: Some(PERSONAL_STREAM.to_string()),
            sub_streams: Vec::new(),
        }
    }

    /// Resolve to a stream key, falling back to `Personal_Stream` when
    /// nothing was chosen. Sub-streams without a parent stream do not resolve.
    pub fn resolve(&self) -> Option<ResolvedStream> {
        let stream = self
            .stream
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (stream, self.sub_streams.is_empty()) {
            (Some(stream), _) => Some(ResolvedStream {
                stream: stream.to_string(),
                sub_streams: self.sub_streams.clone(),
            }),
            (None, true) => Some(ResolvedStream {
                stream: PERSONAL_STREAM.to_string(),
                sub_streams: Vec::new(),
            }),
            (None, false) => None,
        }
    }
}

/// Where eligible assignees come from for a resolved selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneePool {
    /// Only the acting user
    SelfOnly,
    /// A store lookup
    Scope(UserScope),
}

impl ResolvedStream {
    pub fn pool(&self) -> AssigneePool {
        match self.stream.as_str() {
            PERSONAL_STREAM => AssigneePool::SelfOnly,
            UNASSIGNED_USERS => AssigneePool::Scope(UserScope::Unassigned),
            stream if self.sub_streams.is_empty() => AssigneePool::Scope(UserScope::Stream {
                stream: stream.to_string(),
            }),
            stream => AssigneePool::Scope(UserScope::SubStreams {
                stream: stream.to_string(),
                sub_streams: self.sub_streams.clone(),
            }),
        }
    }
}

/// Read-only view over the stream hierarchy and its members
///
/// Nothing is cached: every call goes to the store so a changed selection
/// always sees current membership.
#[derive(Clone)]
pub struct StreamDirectory {
    store: Arc<dyn ActionStore>,
}

impl StreamDirectory {
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        Self { store }
    }

    pub async fn streams(&self, actor: &ActorContext) -> Result<Vec<Stream>> {
        self.store.list_streams(&actor.workspace).await
    }

    pub async fn sub_streams(&self, actor: &ActorContext, stream: &str) -> Result<Vec<SubStream>> {
        self.store.list_sub_streams(&actor.workspace, stream).await
    }

    /// Everyone in the actor's workspace, used for mention suggestions
    pub async fn workspace_members(&self, actor: &ActorContext) -> Result<Vec<User>> {
        self.store
            .list_users(&actor.workspace, &UserScope::Workspace)
            .await
    }

    /// Users that may be set as assignee under the given selection
    pub async fn eligible_assignees(
        &self,
        actor: &ActorContext,
        selection: &StreamSelection,
    ) -> Result<Vec<User>> {
        let Some(resolved) = selection.resolve() else {
            return Ok(Vec::new());
        };

        match resolved.pool() {
            AssigneePool::SelfOnly => Ok(vec![actor.as_user()]),
            AssigneePool::Scope(scope) => {
                let users = self.store.list_users(&actor.workspace, &scope).await?;
                tracing::debug!(
                    stream = %resolved.stream,
                    count = users.len(),
                    "Fetched eligible assignees"
                );
                Ok(users)
            }
        }
    }

    pub async fn is_eligible(
        &self,
        actor: &ActorContext,
        selection: &StreamSelection,
        user_id: &str,
    ) -> Result<bool> {
        let users = self.eligible_assignees(actor, selection).await?;
        Ok(users.iter().any(|u| u.id == user_id))
    }
}
