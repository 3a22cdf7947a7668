//! Infrastructure layer: persistence, notifications, identity, config.

pub mod config;
pub mod identity;
pub mod notifier;
pub mod retry;
pub mod store;

pub use config::MarketplaceConfig;
pub use identity::InMemoryIdentity;
pub use notifier::{
    FailureMode, LogNotifier, Notification, NotificationDispatcher, Notifier, NotifyError,
    RecordingNotifier, Template,
};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use store::{InMemoryStore, PurgeReport, Store, StoreError, UnitOfWork};
