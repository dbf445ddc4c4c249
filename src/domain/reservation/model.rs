//! Reservation domain entity

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Holding its locker
    Active,
    /// Passed its expiration and released by the reconciler
    Expired,
    /// Released early by the owner or an admin
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Expired => "Expired",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(Self::Active),
            "Expired" => Some(Self::Expired),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A time-bounded claim by one user on one locker
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub locker_id: String,
    pub duration_hours: i64,
    /// Fixed at creation; later price changes on the locker do not apply
    pub total_price: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set once the "expiring soon" reminder has been claimed
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// When the reservation left the Active state
    pub closed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Open a new active reservation. `duration_hours` must be positive;
    /// the caller validates it.
    pub fn open(
        user_id: impl Into<String>,
        locker_id: impl Into<String>,
        duration_hours: i64,
        total_price: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            locker_id: locker_id.into(),
            duration_hours,
            total_price,
            status: ReservationStatus::Active,
            created_at: now,
            expires_at: now + Duration::hours(duration_hours),
            reminder_sent_at: None,
            closed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Active and past (or at) its expiration.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at <= now
    }

    /// Active, not yet expired, and expiring within `lookahead` of `now`,
    /// with no reminder claimed so far.
    pub fn needs_reminder(&self, now: DateTime<Utc>, lookahead: Duration) -> bool {
        self.is_active()
            && self.reminder_sent_at.is_none()
            && self.expires_at > now
            && self.expires_at <= now + lookahead
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> Reservation {
        Reservation::open("U1", "L1", 2, 20, now)
    }

    #[test]
    fn open_reservation_is_active() {
        let now = Utc::now();
        let r = sample(now);
        assert!(r.is_active());
        assert_eq!(r.expires_at, now + Duration::hours(2));
        assert!(r.expires_at > r.created_at);
        assert_eq!(r.total_price, 20);
    }

    #[test]
    fn due_at_exact_expiry() {
        let now = Utc::now();
        let r = sample(now);
        assert!(!r.is_due(now + Duration::hours(2) - Duration::seconds(1)));
        assert!(r.is_due(now + Duration::hours(2)));
    }

    #[test]
    fn terminal_reservation_is_never_due() {
        let now = Utc::now();
        let mut r = sample(now);
        r.status = ReservationStatus::Cancelled;
        assert!(!r.is_due(now + Duration::hours(3)));
    }

    #[test]
    fn reminder_window_edges() {
        let now = Utc::now();
        let r = sample(now);
        let lookahead = Duration::minutes(60);
        // expires 2h out: outside
        assert!(!r.needs_reminder(now, lookahead));
        // expires exactly at now + lookahead: inside
        assert!(r.needs_reminder(now + Duration::hours(1), lookahead));
        // one second before the window opens
        assert!(!r.needs_reminder(now + Duration::hours(1) - Duration::seconds(1), lookahead));
        // at expiry: no longer a reminder case
        assert!(!r.needs_reminder(now + Duration::hours(2), lookahead));
    }

    #[test]
    fn claimed_reminder_is_not_repeated() {
        let now = Utc::now();
        let mut r = sample(now);
        r.reminder_sent_at = Some(now);
        assert!(!r.needs_reminder(now + Duration::hours(1), Duration::minutes(60)));
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            ReservationStatus::Active,
            ReservationStatus::Expired,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReservationStatus::parse("Accepted"), None);
    }
}
