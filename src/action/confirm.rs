//! Two-phase confirmation: propose, then confirm or cancel
//!
//! Destructive or ownership-changing operations are staged here first. Only
//! the user who proposed an operation can confirm or cancel it, and a
//! proposal is consumed by whichever happens first. Proposals left undecided
//! expire after a fixed time and are swept on the next `propose`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ActorContext, UserId};

/// A staged operation awaiting the proposer's decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal<T> {
    pub id: Uuid,
    pub proposed_by: UserId,
    pub created_at: DateTime<Utc>,
    pub payload: T,
}

/// How long a proposal waits for a decision
pub const PROPOSAL_TTL_MINUTES: i64 = 15;

impl<T> Proposal<T> {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at >= ttl
    }
}

/// Pending proposals of one kind
pub struct Confirmations<T> {
    label: &'static str,
    ttl: Duration,
    pending: RwLock<HashMap<Uuid, Proposal<T>>>,
}

impl<T: Clone> Confirmations<T> {
    pub fn new(label: &'static str) -> Self {
        Self::with_ttl(label, Duration::minutes(PROPOSAL_TTL_MINUTES))
    }

    pub fn with_ttl(label: &'static str, ttl: Duration) -> Self {
        Self {
            label,
            ttl,
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Stage an operation for the actor, dropping expired proposals first
    pub async fn propose(&self, actor: &ActorContext, payload: T) -> Proposal<T> {
        let now = Utc::now();
        let proposal = Proposal {
            id: Uuid::new_v4(),
            proposed_by: actor.user_id.clone(),
            created_at: now,
            payload,
        };
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|_, p| !p.is_expired(now, self.ttl));
        if pending.len() < before {
            tracing::debug!(
                kind = self.label,
                expired = before - pending.len(),
                "Expired proposals swept"
            );
        }
        pending.insert(proposal.id, proposal.clone());
        proposal
    }

    /// Remove and return a proposal so it can be applied
    ///
    /// An expired proposal is removed and reported as not found.
    pub async fn take(&self, id: Uuid, actor: &ActorContext) -> Result<Proposal<T>> {
        let mut pending = self.pending.write().await;
        let Some(proposal) = pending.remove(&id) else {
            return Err(AppError::NotFound(format!(
                "No pending {} {}",
                self.label, id
            )));
        };
        if proposal.is_expired(Utc::now(), self.ttl) {
            return Err(AppError::NotFound(format!("{} {} expired", self.label, id)));
        }
        if proposal.proposed_by != actor.user_id {
            let proposed_by = proposal.proposed_by.clone();
            pending.insert(id, proposal);
            return Err(AppError::NotAuthorized(format!(
                "Only {} can decide {} {}",
                proposed_by, self.label, id
            )));
        }
        Ok(proposal)
    }

    /// Drop a proposal without applying it
    pub async fn cancel(&self, id: Uuid, actor: &ActorContext) -> Result<Proposal<T>> {
        let proposal = self.take(id, actor).await?;
        tracing::debug!(proposal_id = %id, kind = self.label, "Proposal cancelled");
        Ok(proposal)
    }

    pub async fn get(&self, id: Uuid) -> Option<Proposal<T>> {
        let pending = self.pending.read().await;
        pending
            .get(&id)
            .filter(|p| !p.is_expired(Utc::now(), self.ttl))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        let pending = self.pending.read().await;
        pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
