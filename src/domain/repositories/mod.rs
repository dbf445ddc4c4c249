//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::locker::LockerRepository;
use super::reservation::ReservationRepository;
use super::user::UserRepository;

pub use crate::shared::errors::DomainResult;

// ── RepositoryProvider ──────────────────────────────────────────

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let locker = repos.lockers().find_by_id("L1").await?;
///     let active = repos.reservations().find_by_locker("L1").await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn lockers(&self) -> &dyn LockerRepository;
    fn reservations(&self) -> &dyn ReservationRepository;
    fn users(&self) -> &dyn UserRepository;
}
