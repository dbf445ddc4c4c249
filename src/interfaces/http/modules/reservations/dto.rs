//! Reservation DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::reservations::{LockerSummary, UserSummary};
use crate::application::ReservationView;
use crate::domain::Reservation;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, message = "locker_id is required"))]
    pub locker_id: String,
    /// Whole hours, at least 1
    #[validate(range(min = 1, message = "duration_hours must be at least 1"))]
    pub duration_hours: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LockerSummaryDto {
    pub id: String,
    pub number: i32,
    pub size: String,
}

impl From<LockerSummary> for LockerSummaryDto {
    fn from(l: LockerSummary) -> Self {
        Self {
            id: l.id,
            number: l.number,
            size: l.size.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserSummaryDto {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<UserSummary> for UserSummaryDto {
    fn from(u: UserSummary) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationDto {
    pub id: String,
    pub user_id: String,
    pub locker_id: String,
    pub duration_hours: i64,
    pub total_price: i64,
    /// `Active`, `Expired` or `Cancelled`
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Omitted when the locker record no longer exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locker: Option<LockerSummaryDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummaryDto>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            locker_id: r.locker_id,
            duration_hours: r.duration_hours,
            total_price: r.total_price,
            status: r.status.as_str().to_string(),
            created_at: r.created_at,
            expires_at: r.expires_at,
            reminder_sent_at: r.reminder_sent_at,
            closed_at: r.closed_at,
            locker: None,
            user: None,
        }
    }
}

impl From<ReservationView> for ReservationDto {
    fn from(v: ReservationView) -> Self {
        Self {
            locker: v.locker.map(LockerSummaryDto::from),
            user: v.user.map(UserSummaryDto::from),
            ..Self::from(v.reservation)
        }
    }
}
