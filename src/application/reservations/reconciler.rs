//! Background task that reminds and expires reservations.
//!
//! Every `poll_interval` one cycle runs:
//! 1. reminder scan: Active reservations expiring within the lookahead
//!    window get one "expiring soon" message, guarded by a one-shot claim;
//! 2. expiry sweep: Active reservations at or past `expires_at` are expired
//!    and their lockers released in one atomic batch.
//!
//! A store failure skips the rest of the cycle. Stages are not one unit:
//! reminder claims made before an expiry-stage failure stay committed. The
//! next cycle picks up whatever was missed since both predicates are relative
//! to `now`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::application::bounded::{notify_best_effort, store_call};
use crate::domain::{DomainResult, RepositoryProvider, SharedNotifier};
use crate::shared::shutdown::ShutdownSignal;
use crate::shared::time::SharedClock;

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub poll_interval: Duration,
    pub reminder_lookahead: chrono::Duration,
    pub store_timeout: Duration,
    pub notify_timeout: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            reminder_lookahead: chrono::Duration::minutes(60),
            store_timeout: Duration::from_secs(5),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of one reconciliation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed { reminders_sent: usize, expired: usize },
    /// The store could not be reached; nothing past the failure ran.
    /// Reminder claims from a completed reminder stage stay committed.
    Skipped,
}

pub struct ExpiryReconciler {
    repos: Arc<dyn RepositoryProvider>,
    notifier: SharedNotifier,
    clock: SharedClock,
    settings: ReconcilerSettings,
}

impl ExpiryReconciler {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        notifier: SharedNotifier,
        clock: SharedClock,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            repos,
            notifier,
            clock,
            settings,
        }
    }

    /// Spawn the polling loop. It stops when `shutdown` fires.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                poll_interval_secs = self.settings.poll_interval.as_secs(),
                lookahead_minutes = self.settings.reminder_lookahead.num_minutes(),
                "Expiry reconciler started"
            );

            let mut interval = tokio::time::interval(self.settings.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run_cycle().await;
                    }
                    _ = shutdown.notified().wait() => {
                        info!("Expiry reconciler shutting down");
                        break;
                    }
                }
            }

            info!("Expiry reconciler stopped");
        })
    }

    /// Run one reminder scan followed by one expiry sweep. Never fails.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let now = self.clock.now();

        let reminders_sent = match self.send_reminders(now).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, stage = "reminders", "Store unavailable, skipping reconciliation cycle");
                metrics::counter!("reconciler_cycles_total", "outcome" => "skipped").increment(1);
                return CycleOutcome::Skipped;
            }
        };

        let expired = match store_call(
            self.settings.store_timeout,
            self.repos.reservations().expire_due(now),
        )
        .await
        {
            Ok(expired) => expired,
            Err(e) => {
                warn!(error = %e, stage = "expiry", "Store unavailable, skipping reconciliation cycle");
                metrics::counter!("reconciler_cycles_total", "outcome" => "skipped").increment(1);
                return CycleOutcome::Skipped;
            }
        };

        for r in &expired {
            info!(
                reservation_id = %r.id,
                locker_id = %r.locker_id,
                expires_at = %r.expires_at,
                "Reservation expired"
            );
        }
        metrics::counter!("reservations_expired_total").increment(expired.len() as u64);
        metrics::counter!("reconciler_cycles_total", "outcome" => "completed").increment(1);

        if reminders_sent > 0 || !expired.is_empty() {
            info!(reminders_sent, expired = expired.len(), "Reconciliation cycle complete");
        } else {
            debug!("Reconciliation cycle found nothing to do");
        }

        CycleOutcome::Completed {
            reminders_sent,
            expired: expired.len(),
        }
    }

    async fn send_reminders(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let limit = self.settings.store_timeout;
        let until = now + self.settings.reminder_lookahead;

        let candidates = store_call(
            limit,
            self.repos.reservations().find_reminder_candidates(now, until),
        )
        .await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut user_ids: Vec<String> = candidates.iter().map(|r| r.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let emails: HashMap<String, String> =
            store_call(limit, self.repos.users().find_by_ids(&user_ids))
                .await?
                .into_iter()
                .map(|u| (u.id, u.email))
                .collect();

        let mut sent = 0;
        for r in candidates {
            match store_call(limit, self.repos.reservations().claim_reminder(&r.id, now)).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(reservation_id = %r.id, error = %e, "Failed to claim reminder");
                    continue;
                }
            }

            let Some(email) = emails.get(&r.user_id) else {
                warn!(reservation_id = %r.id, user_id = %r.user_id, "No address for reminder");
                continue;
            };

            let minutes_left = (r.expires_at - now).num_minutes();
            let body = format!(
                "Your locker reservation {} expires at {} (in about {} minutes).",
                r.id,
                r.expires_at.to_rfc3339(),
                minutes_left
            );
            // The claim stands even if delivery fails: at most one attempt.
            let delivered = notify_best_effort(
                self.notifier.as_ref(),
                self.settings.notify_timeout,
                email,
                "Locker reservation expiring soon",
                &body,
            )
            .await;
            if delivered {
                metrics::counter!("reservation_reminders_sent_total").increment(1);
                sent += 1;
            }
        }

        Ok(sent)
    }
}
