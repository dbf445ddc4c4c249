//! Reservation lifecycle and expiry reconciliation

pub mod reconciler;
pub mod service;
pub mod views;

pub use reconciler::{CycleOutcome, ExpiryReconciler, ReconcilerSettings};
pub use service::{Caller, ReservationService, ReservationSettings};
pub use views::{LockerSummary, ReservationView, UserSummary};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::domain::{Locker, LockerSize, RepositoryProvider, SharedNotifier, User, UserRole};
    use crate::infrastructure::database::test_support::migrated_db;
    use crate::infrastructure::notifier::testing::RecordingNotifier;
    use crate::infrastructure::{InMemoryRepositoryProvider, SeaOrmRepositoryProvider};
    use crate::shared::time::{Clock, ManualClock};

    /// Services wired over one store, a manual clock and a recording notifier.
    pub struct Harness {
        pub name: &'static str,
        pub repos: Arc<dyn RepositoryProvider>,
        pub memory: Option<Arc<InMemoryRepositoryProvider>>,
        pub clock: Arc<ManualClock>,
        pub notifier: Arc<RecordingNotifier>,
        pub reservations: Arc<ReservationService>,
        pub reconciler: ExpiryReconciler,
    }

    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .expect("valid start time")
    }

    impl Harness {
        fn build(
            name: &'static str,
            repos: Arc<dyn RepositoryProvider>,
            memory: Option<Arc<InMemoryRepositoryProvider>>,
            clock: Arc<ManualClock>,
            notifier: Arc<RecordingNotifier>,
            sink: SharedNotifier,
        ) -> Self {
            let settings = ReservationSettings {
                store_timeout: Duration::from_secs(5),
                notify_timeout: Duration::from_millis(200),
                ..ReservationSettings::default()
            };
            let reservations = Arc::new(ReservationService::new(
                repos.clone(),
                sink.clone(),
                clock.clone(),
                settings.clone(),
            ));
            let reconciler = ExpiryReconciler::new(
                repos.clone(),
                sink,
                clock.clone(),
                ReconcilerSettings {
                    store_timeout: settings.store_timeout,
                    notify_timeout: settings.notify_timeout,
                    ..ReconcilerSettings::default()
                },
            );
            Self {
                name,
                repos,
                memory,
                clock,
                notifier,
                reservations,
                reconciler,
            }
        }

        pub fn in_memory(start: DateTime<Utc>) -> Self {
            let memory = Arc::new(InMemoryRepositoryProvider::new());
            let notifier = Arc::new(RecordingNotifier::default());
            Self::build(
                "memory",
                memory.clone(),
                Some(memory),
                Arc::new(ManualClock::new(start)),
                notifier.clone(),
                notifier,
            )
        }

        pub async fn sqlite(start: DateTime<Utc>) -> Self {
            let repos = Arc::new(SeaOrmRepositoryProvider::new(migrated_db().await));
            let notifier = Arc::new(RecordingNotifier::default());
            Self::build(
                "sqlite",
                repos,
                None,
                Arc::new(ManualClock::new(start)),
                notifier.clone(),
                notifier,
            )
        }

        /// Same store and clock, different outbound sink. `notifier` keeps
        /// recording nothing; use this for delivery failure cases.
        pub fn with_notifier(self, sink: SharedNotifier) -> Self {
            Self::build(
                self.name,
                self.repos,
                self.memory,
                self.clock,
                Arc::new(RecordingNotifier::default()),
                sink,
            )
        }

        pub async fn seed_user(&self, username: &str) -> Caller {
            let email = format!("{}@example.com", username);
            let user = User::new(username, &email, "x", UserRole::Customer, self.clock.now());
            let caller = Caller {
                user_id: user.id.clone(),
                email,
            };
            self.repos.users().create(user).await.expect("seed user");
            caller
        }

        pub async fn seed_locker(&self, number: i32, hourly_price: i64) -> Locker {
            let locker = Locker::new(number, LockerSize::Medium, hourly_price, self.clock.now());
            self.repos
                .lockers()
                .save(locker.clone())
                .await
                .expect("seed locker");
            locker
        }
    }

    /// One harness per store implementation
    pub async fn harnesses() -> Vec<Harness> {
        vec![
            Harness::in_memory(start_time()),
            Harness::sqlite(start_time()).await,
        ]
    }
}
