//! Outbound ports: capabilities the reservation core calls out to

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Delivery timed out")]
    Timeout,
}

/// Fire-and-forget message delivery to a user address.
///
/// Callers treat every failure as non-fatal: it is logged and never
/// undoes a committed state change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

pub type SharedNotifier = Arc<dyn Notifier>;
