//! Actions: the entity, who may change it, its history and comments, and the
//! engine that ties them together

pub mod access;
pub mod comment;
pub mod confirm;
pub mod engine;
pub mod entity;
pub mod history;
pub mod mention;

pub use access::{Capability, Relation};
pub use comment::{Comment, CommentParent, NewComment, ThreadNode, ThreadReply};
pub use confirm::{Confirmations, Proposal};
pub use engine::{
    ActionEngine, ActionEvent, AppliedReassignment, CommentDeletion, CreatedAction,
    DeletionProposal, Delivery, LoopIn, ReassignOutcome, Reassignment, ReassignmentProposal,
};
pub use entity::{Action, ActionDraft, ActionStatus, AttachmentRef, NewAction, Priority};
pub use history::{page_bounds, FieldChange, HistoryEntry, HistoryPage, NewHistoryEntry};
