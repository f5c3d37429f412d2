//! Notifications: records, the server-side push hub, and the client inbox

pub mod hub;
pub mod inbox;
pub mod notification;

pub use hub::NotificationHub;
pub use inbox::{FetchTicket, MarkAllRead, NotificationInbox};
pub use notification::{
    NewNotification, Notification, NotificationKind, NotificationRoute, NotificationSubject,
    PushEvent, PushEventName,
};
