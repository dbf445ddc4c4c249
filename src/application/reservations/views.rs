//! Read models returned by reservation queries

use std::collections::HashMap;

use crate::domain::{Locker, LockerSize, Reservation, User};

#[derive(Debug, Clone, PartialEq)]
pub struct LockerSummary {
    pub id: String,
    pub number: i32,
    pub size: LockerSize,
}

impl From<&Locker> for LockerSummary {
    fn from(l: &Locker) -> Self {
        Self {
            id: l.id.clone(),
            number: l.number,
            size: l.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
        }
    }
}

/// A reservation joined with minimal locker and user projections.
/// A projection is `None` when the referenced record no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationView {
    pub reservation: Reservation,
    pub locker: Option<LockerSummary>,
    pub user: Option<UserSummary>,
}

pub(crate) fn join(
    reservations: Vec<Reservation>,
    lockers: &HashMap<String, LockerSummary>,
    users: &HashMap<String, UserSummary>,
) -> Vec<ReservationView> {
    reservations
        .into_iter()
        .map(|reservation| ReservationView {
            locker: lockers.get(&reservation.locker_id).cloned(),
            user: users.get(&reservation.user_id).cloned(),
            reservation,
        })
        .collect()
}
