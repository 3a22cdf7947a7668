//! Outbound notifications.
//!
//! Delivery is best effort: [`NotificationDispatcher`] bounds every send with a
//! timeout and only logs failures. Callers dispatch after their unit of work has
//! committed, so a lost notification never undoes a business change.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Message templates known to the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    AccountPending,
    AccountApproved,
    AccountRejected,
    SubscriptionExpired,
    TransactionCreated,
}

impl Template {
    pub fn as_str(self) -> &'static str {
        match self {
            Template::AccountPending => "account_pending",
            Template::AccountApproved => "account_approved",
            Template::AccountRejected => "account_rejected",
            Template::SubscriptionExpired => "subscription_expired",
            Template::TransactionCreated => "transaction_created",
        }
    }
}

impl core::fmt::Display for Template {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub address: String,
    pub template: Template,
    pub data: JsonValue,
}

impl Notification {
    pub fn new(address: impl Into<String>, template: Template, data: JsonValue) -> Self {
        Self {
            address: address.into(),
            template,
            data,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Notification transport (email, SMS, ...).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[async_trait::async_trait]
impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).send(notification).await
    }
}

/// Sends notifications with a bounded wait and swallows every failure.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deliver `notification`. Returns whether it was accepted by the transport.
    pub async fn dispatch(&self, notification: Notification) -> bool {
        let outcome = match tokio::time::timeout(self.timeout, self.notifier.send(&notification)).await
        {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.timeout)),
        };
        match outcome {
            Ok(()) => {
                tracing::debug!(template = %notification.template, "notification sent");
                true
            }
            Err(err) => {
                tracing::warn!(
                    template = %notification.template,
                    address = %notification.address,
                    error = %err,
                    "notification dropped"
                );
                false
            }
        }
    }
}

impl core::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            template = %notification.template,
            address = %notification.address,
            data = %notification.data,
            "notification"
        );
        Ok(())
    }
}

/// How a [`RecordingNotifier`] should misbehave.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    #[default]
    None,
    /// Every send returns an error.
    Reject,
    /// Every send sleeps for the given duration before succeeding.
    Stall(Duration),
}

/// Keeps every delivered notification in memory (tests/dev).
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failure: Mutex<FailureMode>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mode: FailureMode) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Mutex::new(mode),
        }
    }

    pub fn set_failure(&self, mode: FailureMode) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = mode;
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_with(&self, template: Template) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.template == template)
            .collect()
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure.lock().map(|m| *m).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self.failure_mode() {
            FailureMode::None => {}
            FailureMode::Reject => {
                return Err(NotifyError::Delivery("recording notifier set to reject".to_string()));
            }
            FailureMode::Stall(delay) => tokio::time::sleep(delay).await,
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Delivery("lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
