//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,
    pub locker_id: String,

    pub duration_hours: i64,
    pub total_price: i64,

    /// Reservation status: Active, Expired, Cancelled
    pub status: String,

    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub reminder_sent_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub closed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::locker::Entity",
        from = "Column::LockerId",
        to = "super::locker::Column::Id"
    )]
    Locker,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::locker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Locker.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
