//! Locker domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Locker occupancy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockerStatus {
    /// Free to be reserved
    Available,
    /// Held by exactly one active reservation
    Reserved,
}

impl LockerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Reserved => "Reserved",
        }
    }

    /// Parse a stored or user-supplied status; matching is case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Some(Self::Available),
            "reserved" => Some(Self::Reserved),
            _ => None,
        }
    }
}

impl std::fmt::Display for LockerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical size class of a locker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockerSize {
    Small,
    Medium,
    Large,
}

impl LockerSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "small" | "s" => Some(Self::Small),
            "medium" | "m" => Some(Self::Medium),
            "large" | "l" => Some(Self::Large),
            _ => None,
        }
    }
}

impl std::fmt::Display for LockerSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rentable storage locker
#[derive(Debug, Clone, PartialEq)]
pub struct Locker {
    pub id: String,
    /// Display label, unique across lockers
    pub number: i32,
    pub size: LockerSize,
    /// Price per hour in minor currency units
    pub hourly_price: i64,
    pub status: LockerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Locker {
    pub fn new(number: i32, size: LockerSize, hourly_price: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            number,
            size,
            hourly_price,
            status: LockerStatus::Available,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == LockerStatus::Available
    }

    /// Price of holding this locker for `hours`, at the current rate.
    pub fn price_for(&self, hours: i64) -> Option<i64> {
        self.hourly_price.checked_mul(hours)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_locker_is_available() {
        let locker = Locker::new(42, LockerSize::Medium, 10, Utc::now());
        assert!(locker.is_available());
        assert_eq!(locker.number, 42);
        assert!(!locker.id.is_empty());
    }

    #[test]
    fn price_is_rate_times_hours() {
        let locker = Locker::new(1, LockerSize::Small, 10, Utc::now());
        assert_eq!(locker.price_for(2), Some(20));
        assert_eq!(locker.price_for(0), Some(0));
    }

    #[test]
    fn price_overflow_is_none() {
        let locker = Locker::new(1, LockerSize::Small, i64::MAX, Utc::now());
        assert_eq!(locker.price_for(2), None);
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(LockerStatus::parse("AVAILABLE"), Some(LockerStatus::Available));
        assert_eq!(LockerStatus::parse("reserved"), Some(LockerStatus::Reserved));
        assert_eq!(LockerStatus::parse("occupied"), None);
    }

    #[test]
    fn size_accepts_short_codes() {
        assert_eq!(LockerSize::parse("L"), Some(LockerSize::Large));
        assert_eq!(LockerSize::parse("small"), Some(LockerSize::Small));
        assert_eq!(LockerSize::parse("xl"), None);
    }
}
