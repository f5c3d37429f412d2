//! Plain-text rendering for terminal output

use opsdesk::action::{Action, HistoryPage, ThreadNode};
use opsdesk::notify::{Notification, NotificationRoute};

pub fn action_line(action: &Action) -> String {
    format!(
        "{}  [{}] {} ({}, due {}) -> {}",
        action.id,
        action.status.as_str(),
        action.title,
        action.priority.as_str(),
        action.expected_completion_date,
        action.assignee_name.as_deref().unwrap_or("unassigned"),
    )
}

pub fn notification_line(notification: &Notification) -> String {
    let marker = if notification.read { ' ' } else { '*' };
    let target = match notification.route() {
        NotificationRoute::OpenAction { action_id } => format!("action {}", action_id),
        NotificationRoute::OpenSurvey { survey_id } => format!("survey {}", survey_id),
        NotificationRoute::Toast { message } => message,
    };
    format!(
        "{} {}  {} from {} ({})",
        marker,
        notification.created_at.format("%Y-%m-%d %H:%M"),
        notification.title,
        notification.created_by_name,
        target,
    )
}

pub fn thread_lines(thread: &[ThreadNode]) -> Vec<String> {
    let mut lines = Vec::new();
    for node in thread {
        lines.push(format!(
            "{}: {}",
            node.comment.created_by_name, node.comment.description
        ));
        for reply in &node.replies {
            lines.push(format!(
                "    {}: {}",
                reply.comment.created_by_name, reply.comment.description
            ));
        }
    }
    lines
}

pub fn history_lines(page: &HistoryPage) -> Vec<String> {
    page.data
        .iter()
        .flat_map(|entry| {
            entry.changes.iter().map(move |change| {
                format!(
                    "{}  {} set {}: {} -> {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.modified_by_name,
                    change.field,
                    change.old_value,
                    change.new_value,
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use opsdesk::notify::{NotificationKind, NotificationSubject};
    use uuid::Uuid;

    fn notification(kind: NotificationKind, read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: "u2".to_string(),
            subject: NotificationSubject::Action(Uuid::nil()),
            title: "Renew SSL cert".to_string(),
            created_by_name: "Ana Gomez".to_string(),
            read,
            notification_type: kind,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unread_notification_is_starred() {
        let line = notification_line(&notification(NotificationKind::Assignment, false));
        assert!(line.starts_with('*'));
        assert!(line.contains("Renew SSL cert from Ana Gomez"));
        assert!(line.contains(&format!("action {}", Uuid::nil())));
    }

    #[test]
    fn test_reply_notification_renders_as_toast() {
        let line = notification_line(&notification(NotificationKind::CommentReply, true));
        assert!(line.starts_with(' '));
        assert!(line.contains("Ana Gomez replied: Renew SSL cert"));
    }
}
