//! Database entities module

pub mod locker;
pub mod reservation;
pub mod user;

pub use locker::Entity as Locker;
pub use reservation::Entity as Reservation;
pub use user::Entity as User;
