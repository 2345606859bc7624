//! Background notification writer.

use std::sync::Arc;

use bmessage_core::NotificationSink;
use bmessage_store::{Backend, Notification};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Hands notifications to a background writer that appends them to the
/// backend. Delivery never blocks the request that produced it.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Spawn the writer on the blocking pool, since every append is a
    /// synchronous storage call. It runs until every sender is dropped.
    pub fn spawn(backend: Arc<dyn Backend>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::task::spawn_blocking(move || run_writer(rx, backend));
        (Self { tx }, handle)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("Notification writer stopped, dropping notification");
        }
    }
}

fn run_writer(mut rx: mpsc::UnboundedReceiver<Notification>, backend: Arc<dyn Backend>) {
    while let Some(notification) = rx.blocking_recv() {
        match backend.append_notification(&notification) {
            Ok(()) => debug!(
                user = %notification.user_id,
                kind = notification.kind.as_str(),
                "Notification stored"
            ),
            Err(e) => error!(
                user = %notification.user_id,
                error = %e,
                "Failed to store notification"
            ),
        }
    }
    debug!("Notification writer finished");
}
