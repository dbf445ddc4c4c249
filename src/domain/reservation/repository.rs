//! Reservation repository interface
//!
//! Besides plain reads, the repository owns the paired mutations of the
//! reservation lifecycle. Each of `open`, `close`, and `expire_due` is applied
//! as one atomic unit whose writes are conditioned on the expected pre-state
//! (`Available` locker, `Active` reservation). A condition that does not hold
//! rolls the whole unit back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Reservation, ReservationStatus};
use crate::domain::DomainResult;

/// Outcome of a conditional close (cancel or expire) of one reservation.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// The reservation left Active and its locker is Available again.
    Closed(Reservation),
    /// The reservation does not exist or was no longer Active; nothing changed.
    NotActive,
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>>;

    /// All reservations of a user, newest first
    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>>;

    /// All reservations, newest first
    async fn find_all(&self) -> DomainResult<Vec<Reservation>>;

    /// The locker's Active reservation if any, else its most recent one.
    async fn find_by_locker(&self, locker_id: &str) -> DomainResult<Option<Reservation>>;

    /// Active reservations with `now < expires_at <= until` and no reminder claimed
    async fn find_reminder_candidates(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>>;

    /// Atomically flip the referenced locker Available -> Reserved and insert
    /// the reservation. Returns `false` (and changes nothing) when the locker
    /// is missing or not Available at commit time.
    async fn open(&self, reservation: &Reservation) -> DomainResult<bool>;

    /// Atomically move an Active reservation to `to` (Cancelled or Expired)
    /// and flip its locker Reserved -> Available.
    ///
    /// A missing locker is an integrity fault: the unit is rolled back and
    /// `Internal` is returned.
    async fn close(
        &self,
        id: &str,
        to: ReservationStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<CloseOutcome>;

    /// Expire every reservation that is Active with `expires_at <= now`, and
    /// release their lockers, in one atomic batch. Returns what was expired.
    /// Safe to re-run: already-terminal rows are not selected again.
    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>>;

    /// Claim the reminder for an Active reservation. Only the first claim
    /// returns `true`.
    async fn claim_reminder(&self, id: &str, at: DateTime<Utc>) -> DomainResult<bool>;
}
