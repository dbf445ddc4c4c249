//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod locker_repository;
pub mod repository_provider;
pub mod reservation_repository;
pub mod user_repository;

pub use locker_repository::SeaOrmLockerRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use reservation_repository::SeaOrmReservationRepository;
pub use user_repository::SeaOrmUserRepository;
