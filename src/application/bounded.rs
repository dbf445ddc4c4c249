//! Deadlines for calls leaving the application layer

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{DomainError, DomainResult, Notifier, NotifyError};

/// Run a store call with a deadline. An elapsed deadline is `Unavailable`.
pub(crate) async fn store_call<T, F>(limit: Duration, call: F) -> DomainResult<T>
where
    F: Future<Output = DomainResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DomainError::Unavailable(format!(
            "Store did not answer within {:?}",
            limit
        ))),
    }
}

/// Deliver a notification with a deadline. Failures are logged and dropped.
pub(crate) async fn notify_best_effort(
    notifier: &dyn Notifier,
    limit: Duration,
    to: &str,
    subject: &str,
    body: &str,
) -> bool {
    let outcome = match tokio::time::timeout(limit, notifier.send(to, subject, body)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::Timeout),
    };
    match outcome {
        Ok(()) => {
            debug!(to, subject, "Notification delivered");
            true
        }
        Err(e) => {
            warn!(to, subject, error = %e, "Notification failed");
            false
        }
    }
}
