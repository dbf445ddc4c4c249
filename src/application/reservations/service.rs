//! Reservation lifecycle service
//!
//! Request-time operations on reservations. Every paired mutation goes
//! through one conditional store unit, so a concurrent request or the expiry
//! sweep can never leave a locker and its reservation disagreeing.
//! Notifications are sent only after the unit has committed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::views::{join, LockerSummary, ReservationView, UserSummary};
use crate::application::bounded::{notify_best_effort, store_call};
use crate::domain::{
    CloseOutcome, DomainError, DomainResult, RepositoryProvider, Reservation, ReservationStatus,
    SharedNotifier,
};
use crate::shared::time::SharedClock;

/// Identity of the user making a request
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ReservationSettings {
    pub max_duration_hours: i64,
    pub store_timeout: Duration,
    pub notify_timeout: Duration,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            max_duration_hours: 720,
            store_timeout: Duration::from_secs(5),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

pub struct ReservationService {
    repos: Arc<dyn RepositoryProvider>,
    notifier: SharedNotifier,
    clock: SharedClock,
    settings: ReservationSettings,
}

impl ReservationService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        notifier: SharedNotifier,
        clock: SharedClock,
        settings: ReservationSettings,
    ) -> Self {
        Self {
            repos,
            notifier,
            clock,
            settings,
        }
    }

    // ── Commands ────────────────────────────────────────────────

    /// Reserve an Available locker for `duration_hours` whole hours.
    pub async fn reserve(
        &self,
        caller: &Caller,
        locker_id: &str,
        duration_hours: i64,
    ) -> DomainResult<Reservation> {
        if locker_id.trim().is_empty() {
            return Err(DomainError::InvalidArgument("locker_id is required".into()));
        }
        if duration_hours <= 0 {
            return Err(DomainError::InvalidArgument(
                "duration_hours must be a positive number of hours".into(),
            ));
        }
        if duration_hours > self.settings.max_duration_hours {
            return Err(DomainError::InvalidArgument(format!(
                "duration_hours must not exceed {}",
                self.settings.max_duration_hours
            )));
        }

        let limit = self.settings.store_timeout;
        let locker = store_call(limit, self.repos.lockers().find_by_id(locker_id))
            .await?
            .ok_or_else(|| DomainError::not_found("Locker", "id", locker_id))?;

        if !locker.is_available() {
            return Err(unavailable(locker.number));
        }

        let total_price = locker.price_for(duration_hours).ok_or_else(|| {
            DomainError::InvalidArgument("total price exceeds the supported range".into())
        })?;

        let reservation = Reservation::open(
            &caller.user_id,
            &locker.id,
            duration_hours,
            total_price,
            self.clock.now(),
        );

        let opened = store_call(limit, self.repos.reservations().open(&reservation)).await?;
        if !opened {
            // Lost the race: report what the locker looks like now.
            return match store_call(limit, self.repos.lockers().find_by_id(locker_id)).await? {
                None => Err(DomainError::not_found("Locker", "id", locker_id)),
                Some(current) => Err(unavailable(current.number)),
            };
        }

        metrics::counter!("reservations_created_total").increment(1);
        info!(
            reservation_id = %reservation.id,
            locker_id = %locker.id,
            user_id = %caller.user_id,
            hours = duration_hours,
            total_price,
            "Reservation created"
        );

        let body = format!(
            "Your reservation of locker {} is confirmed until {}. Total price: {}.",
            locker.number,
            reservation.expires_at.to_rfc3339(),
            total_price
        );
        notify_best_effort(
            self.notifier.as_ref(),
            self.settings.notify_timeout,
            &caller.email,
            "Locker reservation confirmed",
            &body,
        )
        .await;

        Ok(reservation)
    }

    /// Cancel an Active reservation and release its locker.
    pub async fn cancel(&self, reservation_id: &str) -> DomainResult<()> {
        let limit = self.settings.store_timeout;
        let now = self.clock.now();

        let outcome = store_call(
            limit,
            self.repos
                .reservations()
                .close(reservation_id, ReservationStatus::Cancelled, now),
        )
        .await?;

        let reservation = match outcome {
            CloseOutcome::Closed(r) => r,
            CloseOutcome::NotActive => {
                return Err(DomainError::not_found("Reservation", "id", reservation_id))
            }
        };

        metrics::counter!("reservations_cancelled_total").increment(1);
        info!(
            reservation_id = %reservation.id,
            locker_id = %reservation.locker_id,
            "Reservation cancelled"
        );

        match store_call(limit, self.repos.users().find_by_id(&reservation.user_id)).await {
            Ok(Some(owner)) => {
                let body = format!(
                    "Your reservation {} has been cancelled and the locker released.",
                    reservation.id
                );
                notify_best_effort(
                    self.notifier.as_ref(),
                    self.settings.notify_timeout,
                    &owner.email,
                    "Locker reservation cancelled",
                    &body,
                )
                .await;
            }
            Ok(None) => warn!(user_id = %reservation.user_id, "Owner of cancelled reservation not found"),
            Err(e) => warn!(error = %e, "Could not resolve owner for cancellation notice"),
        }

        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────

    pub async fn get_by_id(&self, reservation_id: &str) -> DomainResult<ReservationView> {
        let reservation = store_call(
            self.settings.store_timeout,
            self.repos.reservations().find_by_id(reservation_id),
        )
        .await?
        .ok_or_else(|| DomainError::not_found("Reservation", "id", reservation_id))?;
        self.single_view(reservation).await
    }

    /// All reservations of one user, newest first
    pub async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<ReservationView>> {
        let reservations = store_call(
            self.settings.store_timeout,
            self.repos.reservations().find_by_user(user_id),
        )
        .await?;
        self.views(reservations).await
    }

    /// Every reservation, newest first
    pub async fn list_all(&self) -> DomainResult<Vec<ReservationView>> {
        let reservations = store_call(
            self.settings.store_timeout,
            self.repos.reservations().find_all(),
        )
        .await?;
        self.views(reservations).await
    }

    /// The locker's Active reservation, or its most recent one
    pub async fn get_by_locker(&self, locker_id: &str) -> DomainResult<ReservationView> {
        let reservation = store_call(
            self.settings.store_timeout,
            self.repos.reservations().find_by_locker(locker_id),
        )
        .await?
        .ok_or_else(|| DomainError::not_found("Reservation", "locker_id", locker_id))?;
        self.single_view(reservation).await
    }

    // ── Projections ─────────────────────────────────────────────

    async fn single_view(&self, reservation: Reservation) -> DomainResult<ReservationView> {
        let mut views = self.views(vec![reservation]).await?;
        views
            .pop()
            .ok_or_else(|| DomainError::Internal("projection lost a reservation".into()))
    }

    async fn views(&self, reservations: Vec<Reservation>) -> DomainResult<Vec<ReservationView>> {
        if reservations.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.settings.store_timeout;

        let lockers: HashMap<String, LockerSummary> =
            store_call(limit, self.repos.lockers().find_all())
                .await?
                .iter()
                .map(|l| (l.id.clone(), LockerSummary::from(l)))
                .collect();

        let mut user_ids: Vec<String> = reservations.iter().map(|r| r.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let users: HashMap<String, UserSummary> =
            store_call(limit, self.repos.users().find_by_ids(&user_ids))
                .await?
                .iter()
                .map(|u| (u.id.clone(), UserSummary::from(u)))
                .collect();

        Ok(join(reservations, &lockers, &users))
    }
}

fn unavailable(number: i32) -> DomainError {
    DomainError::Conflict(format!("Locker {} is no longer available", number))
}
