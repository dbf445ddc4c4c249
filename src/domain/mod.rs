pub mod locker;
pub mod ports;
pub mod repositories;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use locker::{Locker, LockerRepository, LockerSize, LockerStatus, LockerUpdate};
pub use ports::{Notifier, NotifyError, SharedNotifier};
pub use repositories::{DomainResult, RepositoryProvider};
pub use reservation::{CloseOutcome, Reservation, ReservationRepository, ReservationStatus};
pub use user::{User, UserRepository, UserRole};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::DomainError;
