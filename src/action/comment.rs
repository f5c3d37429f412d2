//! Comment threads on actions
//!
//! Replies are exactly one level deep. The parent link is stored as a
//! nullable column and surfaces in JSON as `parent_comment`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mention;
use crate::models::{ActorContext, User, UserId};

/// Where a comment sits in its thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Uuid>", into = "Option<Uuid>")]
pub enum CommentParent {
    Root,
    Reply(Uuid),
}

impl CommentParent {
    pub fn parent_id(&self) -> Option<Uuid> {
        match self {
            CommentParent::Root => None,
            CommentParent::Reply(id) => Some(*id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, CommentParent::Root)
    }
}

impl From<Option<Uuid>> for CommentParent {
    fn from(parent: Option<Uuid>) -> Self {
        match parent {
            Some(id) => CommentParent::Reply(id),
            None => CommentParent::Root,
        }
    }
}

impl From<CommentParent> for Option<Uuid> {
    fn from(parent: CommentParent) -> Self {
        parent.parent_id()
    }
}

/// A persisted comment or reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub action_id: Uuid,
    /// May embed `@Full Name` mention tokens
    pub description: String,
    pub created_by: UserId,
    pub created_by_name: String,
    pub role: String,
    pub parent_comment: CommentParent,
    pub created_at: DateTime<Utc>,
}

/// Input for `ActionStore::post_comment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub action_id: Uuid,
    pub description: String,
    pub created_by: UserId,
    pub created_by_name: String,
    pub role: String,
    pub parent_comment: CommentParent,
}

impl NewComment {
    pub fn by(
        actor: &ActorContext,
        action_id: Uuid,
        description: impl Into<String>,
        parent_comment: CommentParent,
    ) -> Self {
        Self {
            action_id,
            description: description.into(),
            created_by: actor.user_id.clone(),
            created_by_name: actor.user_name.clone(),
            role: actor.role.clone(),
            parent_comment,
        }
    }
}

/// A root comment with its replies, as shown in a thread view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadNode {
    pub comment: Comment,
    pub mentions: Vec<UserId>,
    pub replies: Vec<ThreadReply>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadReply {
    pub comment: Comment,
    pub mentions: Vec<UserId>,
}

/// Group a flat comment list into roots with replies, both in creation order
///
/// Replies whose root is not in the list are left out.
pub fn assemble_thread(mut comments: Vec<Comment>, members: &[User]) -> Vec<ThreadNode> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let (roots, replies): (Vec<Comment>, Vec<Comment>) =
        comments.into_iter().partition(|c| c.parent_comment.is_root());

    let mut nodes: Vec<ThreadNode> = roots
        .into_iter()
        .map(|comment| ThreadNode {
            mentions: mention::resolve(&comment.description, members),
            comment,
            replies: Vec::new(),
        })
        .collect();

    for reply in replies {
        let parent_id = reply.parent_comment.parent_id();
        match nodes.iter_mut().find(|n| Some(n.comment.id) == parent_id) {
            Some(node) => node.replies.push(ThreadReply {
                mentions: mention::resolve(&reply.description, members),
                comment: reply,
            }),
            None => tracing::debug!(reply_id = %reply.id, "Dropping reply without a root"),
        }
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn comment(action_id: Uuid, parent: CommentParent, text: &str, offset: i64) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            action_id,
            description: text.to_string(),
            created_by: "u1".to_string(),
            created_by_name: "Ana Gomez".to_string(),
            role: "member".to_string(),
            parent_comment: parent,
            created_at: Utc::now() + Duration::seconds(offset),
        }
    }

    fn members() -> Vec<User> {
        vec![
            User {
                id: "u1".to_string(),
                name: "Ana Gomez".to_string(),
                role: "member".to_string(),
            },
            User {
                id: "u2".to_string(),
                name: "Ben Gomez".to_string(),
                role: "member".to_string(),
            },
        ]
    }

    #[test]
    fn test_parent_serializes_as_nullable_id() {
        let json = serde_json::to_value(CommentParent::Root).unwrap();
        assert!(json.is_null());

        let id = Uuid::new_v4();
        let json = serde_json::to_value(CommentParent::Reply(id)).unwrap();
        assert_eq!(json, serde_json::json!(id.to_string()));

        let parsed: CommentParent = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert_eq!(parsed, CommentParent::Root);
    }

    #[test]
    fn test_assemble_thread_groups_replies() {
        let action_id = Uuid::new_v4();
        let first = comment(action_id, CommentParent::Root, "first", 0);
        let second = comment(action_id, CommentParent::Root, "second", 10);
        let reply_b = comment(action_id, CommentParent::Reply(first.id), "reply b", 20);
        let reply_a = comment(action_id, CommentParent::Reply(first.id), "reply a", 5);

        let thread = assemble_thread(
            vec![reply_b.clone(), second.clone(), reply_a.clone(), first.clone()],
            &members(),
        );

        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].comment.id, first.id);
        assert_eq!(thread[1].comment.id, second.id);
        let reply_ids: Vec<Uuid> = thread[0].replies.iter().map(|r| r.comment.id).collect();
        assert_eq!(reply_ids, vec![reply_a.id, reply_b.id]);
        assert!(thread[1].replies.is_empty());
    }

    #[test]
    fn test_assemble_thread_drops_orphans() {
        let action_id = Uuid::new_v4();
        let orphan = comment(action_id, CommentParent::Reply(Uuid::new_v4()), "lost", 0);
        assert!(assemble_thread(vec![orphan], &members()).is_empty());
    }

    #[test]
    fn test_assemble_thread_resolves_mentions() {
        let action_id = Uuid::new_v4();
        let root = comment(action_id, CommentParent::Root, "@Ben Gomez can you check?", 0);
        let thread = assemble_thread(vec![root], &members());
        assert_eq!(thread[0].mentions, vec!["u2".to_string()]);
    }
}
