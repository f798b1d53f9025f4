/// Bounded notification queue and its delivery worker
///
/// Request handlers hand notifications to the queue without waiting for
/// delivery. A single worker drains it, rendering each notification and
/// delivering it through a [`NotificationSink`], retrying failures with
/// exponential backoff.
use super::templates::Notification;
use crate::{error::MarketResult, metrics};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;

/// Something that can deliver a rendered message to an address
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> MarketResult<()>;
}

/// A notification addressed to one recipient
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub to: String,
    pub notification: Notification,
}

/// Producer side of the queue
#[derive(Clone)]
pub struct NotificationQueue {
    sender: Sender<Envelope>,
}

impl NotificationQueue {
    /// Create a queue holding at most `capacity` undelivered notifications
    pub fn bounded(capacity: usize) -> (Self, Receiver<Envelope>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a notification without waiting; returns false when it was dropped
    pub fn enqueue(&self, to: impl Into<String>, notification: Notification) -> bool {
        let kind = notification.kind();
        let envelope = Envelope {
            to: to.into(),
            notification,
        };

        match self.sender.try_send(envelope) {
            Ok(()) => {
                metrics::record_notification(kind, "queued");
                true
            }
            Err(TrySendError::Full(envelope)) => {
                metrics::record_notification(kind, "dropped");
                tracing::warn!(
                    "Notification queue full, dropping {} notification to {}",
                    kind,
                    envelope.to
                );
                false
            }
            Err(TrySendError::Closed(envelope)) => {
                metrics::record_notification(kind, "dropped");
                tracing::error!(
                    "Notification worker stopped, dropping {} notification to {}",
                    kind,
                    envelope.to
                );
                false
            }
        }
    }
}

/// Retry policy for the worker
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Consumer side of the queue
pub struct NotificationWorker {
    receiver: Receiver<Envelope>,
    sink: Arc<dyn NotificationSink>,
    site_url: String,
    policy: RetryPolicy,
}

impl NotificationWorker {
    pub fn new(
        receiver: Receiver<Envelope>,
        sink: Arc<dyn NotificationSink>,
        site_url: String,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            receiver,
            sink,
            site_url,
            policy,
        }
    }

    /// Run until every producer is dropped
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::info!("Notification worker started");

        while let Some(envelope) = self.receiver.recv().await {
            self.deliver(&envelope).await;
        }

        tracing::info!("Notification worker stopped");
    }

    /// Deliver one envelope, retrying up to the policy's attempt limit
    async fn deliver(&self, envelope: &Envelope) -> bool {
        let kind = envelope.notification.kind();
        let email = envelope.notification.render(&self.site_url);
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self
                .sink
                .deliver(&envelope.to, &email.subject, &email.body)
                .await
            {
                Ok(()) => {
                    metrics::record_notification(kind, "delivered");
                    tracing::info!("Delivered {} notification to {}", kind, envelope.to);
                    return true;
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        "Delivery of {} notification to {} failed (attempt {}/{}): {}; retrying in {:?}",
                        kind,
                        envelope.to,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    metrics::record_notification(kind, "failed");
                    tracing::error!(
                        "Giving up on {} notification to {} after {} attempts: {}",
                        kind,
                        envelope.to,
                        max_attempts,
                        e
                    );
                }
            }
        }

        false
    }
}
