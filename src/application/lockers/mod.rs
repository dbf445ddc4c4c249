pub mod service;

pub use service::LockerService;
