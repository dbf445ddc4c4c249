//! Locker DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::{Locker, LockerSize, LockerStatus, LockerUpdate};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LockerDto {
    pub id: String,
    pub number: i32,
    /// `small`, `medium` or `large`
    pub size: String,
    /// Price per hour in minor currency units
    pub hourly_price: i64,
    /// `Available` or `Reserved`
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Locker> for LockerDto {
    fn from(l: &Locker) -> Self {
        Self {
            id: l.id.clone(),
            number: l.number,
            size: l.size.as_str().to_string(),
            hourly_price: l.hourly_price,
            status: l.status.as_str().to_string(),
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLockerRequest {
    #[validate(range(min = 1, message = "number must be positive"))]
    pub number: i32,
    #[validate(length(min = 1, message = "size is required"))]
    pub size: String,
    #[validate(range(min = 0, message = "hourly_price must not be negative"))]
    pub hourly_price: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateLockerRequest {
    #[validate(range(min = 1, message = "number must be positive"))]
    pub number: Option<i32>,
    pub size: Option<String>,
    #[validate(range(min = 0, message = "hourly_price must not be negative"))]
    pub hourly_price: Option<i64>,
}

impl UpdateLockerRequest {
    pub fn into_update(self) -> Result<LockerUpdate, String> {
        let size = self.size.as_deref().map(parse_size).transpose()?;
        Ok(LockerUpdate {
            number: self.number,
            size,
            hourly_price: self.hourly_price,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LockerListQuery {
    /// Filter by status: `available` or `reserved`
    pub status: Option<String>,
}

impl LockerListQuery {
    pub fn status(&self) -> Result<Option<LockerStatus>, String> {
        self.status
            .as_deref()
            .map(|s| LockerStatus::parse(s).ok_or_else(|| format!("Unknown locker status '{}'", s)))
            .transpose()
    }
}

pub fn parse_size(s: &str) -> Result<LockerSize, String> {
    LockerSize::parse(s).ok_or_else(|| format!("Unknown locker size '{}'", s))
}
