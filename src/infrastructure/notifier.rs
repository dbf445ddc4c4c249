//! Notifier adapters

use async_trait::async_trait;
use tracing::info;

use crate::domain::{Notifier, NotifyError};

/// Writes outbound messages to the structured log. Mail delivery is handled
/// by whatever ships the logs.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(target: "notifications", to, subject, body, "Outbound notification");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Sent {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    /// Captures every message; optionally fails or stalls each send.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Sent>>,
        fail: bool,
        stall: Option<Duration>,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn stalling(delay: Duration) -> Self {
            Self {
                stall: Some(delay),
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
            if let Some(delay) = self.stall {
                tokio::time::sleep(delay).await;
            }
            self.sent.lock().unwrap().push(Sent {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            if self.fail {
                return Err(NotifyError::Delivery("mailbox unavailable".into()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.send("a@example.com", "hi", "body").await.is_ok());
    }
}
