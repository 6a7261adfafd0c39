//! TracingNotifier - notifications become log events.

use async_trait::async_trait;
use tracing::info;

use crate::ports::{CollaboratorError, Notification, Notifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError> {
        info!(
            task_id = %notification.task_id,
            title = notification.title.as_deref().unwrap_or(""),
            channel = notification.channel.as_deref().unwrap_or("log"),
            deliver_at = ?notification.deliver_at,
            message = %notification.message,
            "notification"
        );
        Ok(())
    }
}
