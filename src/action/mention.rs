//! `@Name` mentions in comment text

use crate::models::{User, UserId};

/// The partial mention being typed at the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionQuery {
    /// Byte offset of the `@`
    pub start: usize,
    /// Byte offset of the cursor
    pub end: usize,
    pub query: String,
}

fn clamp_to_boundary(text: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

/// Find the last `@` before the cursor and the non-empty query after it
pub fn query_at(text: &str, cursor: usize) -> Option<MentionQuery> {
    let end = clamp_to_boundary(text, cursor);
    let before = &text[..end];
    let start = before.rfind('@')?;
    let query = &before[start + 1..];
    if query.is_empty() {
        return None;
    }
    Some(MentionQuery {
        start,
        end,
        query: query.to_string(),
    })
}

/// Members whose display name contains the query, case-insensitively
///
/// Every match is returned, in member order.
pub fn suggest<'a>(text: &str, cursor: usize, members: &'a [User]) -> Vec<&'a User> {
    let Some(mention) = query_at(text, cursor) else {
        return Vec::new();
    };
    let needle = mention.query.to_lowercase();
    members
        .iter()
        .filter(|member| member.name.to_lowercase().contains(&needle))
        .collect()
}

/// Replace the text from the last `@` up to the cursor with `@<full_name> `
///
/// Returns the new text and the cursor position after the inserted mention.
/// Text without a pending mention is returned unchanged.
pub fn complete(text: &str, cursor: usize, full_name: &str) -> (String, usize) {
    let end = clamp_to_boundary(text, cursor);
    let Some(start) = text[..end].rfind('@') else {
        return (text.to_string(), end);
    };
    let inserted = format!("@{} ", full_name);
    let mut completed = String::with_capacity(text.len() + inserted.len());
    completed.push_str(&text[..start]);
    completed.push_str(&inserted);
    completed.push_str(&text[end..]);
    (completed, start + inserted.len())
}

/// Ids of members mentioned as `@Full Name`, in order of first appearance
pub fn resolve(text: &str, members: &[User]) -> Vec<UserId> {
    let lowered = text.to_lowercase();
    let mut found: Vec<(usize, &User)> = members
        .iter()
        .filter(|member| !member.name.is_empty())
        .filter_map(|member| {
            let token = format!("@{}", member.name.to_lowercase());
            lowered.find(&token).map(|pos| (pos, member))
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);

    let mut ids: Vec<UserId> = Vec::new();
    for (_, member) in found {
        if !ids.contains(&member.id) {
            ids.push(member.id.clone());
        }
    }
    ids
}
