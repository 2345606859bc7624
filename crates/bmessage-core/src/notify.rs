//! Outbound notifications.

use bmessage_store::{Notification, NotificationKind};
use chrono::{DateTime, Utc};

use crate::new_id;

/// Fire-and-forget delivery of notification records. Implementations must
/// not block the caller on I/O and must swallow their own failures.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification);
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn deliver(&self, _notification: Notification) {}
}

pub(crate) struct Event<'a> {
    pub kind: NotificationKind,
    pub actor_id: &'a str,
    pub conversation_id: Option<&'a str>,
    pub message_id: Option<&'a str>,
    pub post_id: Option<&'a str>,
    pub at: DateTime<Utc>,
}

impl Event<'_> {
    pub(crate) fn for_recipient(&self, recipient_id: &str) -> Notification {
        Notification {
            id: new_id(),
            user_id: recipient_id.to_string(),
            kind: self.kind,
            from_user_id: self.actor_id.to_string(),
            conversation_id: self.conversation_id.map(str::to_string),
            message_id: self.message_id.map(str::to_string),
            post_id: self.post_id.map(str::to_string),
            timestamp: self.at,
            read: false,
        }
    }
}

/// Deliver `event` to every recipient except the actor.
pub(crate) fn fan_out<'r>(
    sink: &dyn NotificationSink,
    event: &Event<'_>,
    recipients: impl IntoIterator<Item = &'r String>,
) {
    for recipient in recipients {
        if recipient != event.actor_id {
            sink.deliver(event.for_recipient(recipient));
        }
    }
}
