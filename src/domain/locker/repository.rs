//! Locker repository interface

use async_trait::async_trait;

use super::model::{Locker, LockerSize, LockerStatus};
use crate::domain::DomainResult;

/// Administrative changes to a locker. Status is never part of an update:
/// it belongs to the reservation lifecycle.
#[derive(Debug, Clone, Default)]
pub struct LockerUpdate {
    pub number: Option<i32>,
    pub size: Option<LockerSize>,
    pub hourly_price: Option<i64>,
}

#[async_trait]
pub trait LockerRepository: Send + Sync {
    /// Save a new locker
    async fn save(&self, locker: Locker) -> DomainResult<()>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Locker>>;

    async fn find_by_number(&self, number: i32) -> DomainResult<Option<Locker>>;

    /// All lockers ordered by number
    async fn find_all(&self) -> DomainResult<Vec<Locker>>;

    async fn find_by_status(&self, status: LockerStatus) -> DomainResult<Vec<Locker>>;

    /// Apply an administrative update; returns the updated locker or `None`
    /// if it does not exist.
    async fn update_details(&self, id: &str, update: LockerUpdate) -> DomainResult<Option<Locker>>;

    /// Delete a locker that is Available and never referenced by a reservation.
    /// Returns `false` when the locker exists but does not qualify, and
    /// `NotFound` when it does not exist.
    async fn delete_if_unused(&self, id: &str) -> DomainResult<bool>;
}
