//! Application layer: use-case orchestration over the domain ports

pub(crate) mod bounded;
pub mod identity;
pub mod lockers;
pub mod reservations;

pub use identity::{AuthResult, AuthenticatedUser, IdentityService, IdentitySettings};
pub use lockers::LockerService;
pub use reservations::{
    Caller, CycleOutcome, ExpiryReconciler, ReconcilerSettings, ReservationService,
    ReservationSettings, ReservationView,
};
