//! Notification sinks.
//!
//! A sink displays a notification somewhere (OS notification centre, a
//! terminal, a test channel). Sinks are called from their own spawned task,
//! so a slow or failing sink cannot hold up a scan or the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::task::Urgency;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// `None` for confirmations that are not deadline reminders
    pub urgency: Option<Urgency>,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        urgency: Option<Urgency>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            urgency,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Fire-and-forget delivery. Errors are logged on the spawned task.
pub fn dispatch(sink: &Arc<dyn NotificationSink>, notification: Notification) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let title = notification.title.clone();
        if let Err(e) = sink.notify(notification).await {
            tracing::warn!(%title, "Failed to deliver notification: {:#}", e);
        }
    });
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        tracing::info!(
            urgency = ?notification.urgency,
            "{}: {}",
            notification.title,
            notification.message.replace('\n', " | ")
        );
        Ok(())
    }
}

/// Discards everything. Used when notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn notify(&self, _notification: Notification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        self.tx
            .send(notification)
            .map_err(|_| anyhow::anyhow!("notification receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FailingSink {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn notify(&self, _notification: Notification) -> anyhow::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("display server unavailable")
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_to_channel() {
        let (sink, mut rx) = ChannelSink::new();
        let sink: Arc<dyn NotificationSink> = Arc::new(sink);
        dispatch(&sink, Notification::new("t", "m", Some(Urgency::DueToday)));

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timely delivery")
            .expect("notification");
        assert_eq!(received.title, "t");
        assert_eq!(received.urgency, Some(Urgency::DueToday));
    }

    #[tokio::test]
    async fn failing_sink_errors_stay_on_the_delivery_task() {
        let failing = Arc::new(FailingSink::default());
        let sink: Arc<dyn NotificationSink> = failing.clone();
        dispatch(&sink, Notification::new("first", "m", None));
        dispatch(&sink, Notification::new("second", "m", None));

        // Both deliveries are attempted even though the first one failed.
        tokio::time::timeout(Duration::from_secs(5), async {
            while failing.attempts.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("both deliveries attempted");
    }

    #[tokio::test]
    async fn channel_sink_errors_once_receiver_is_gone() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(sink.notify(Notification::new("t", "m", None)).await.is_err());
    }
}
