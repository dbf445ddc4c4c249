//! SeaORM implementation of ReservationRepository
//!
//! The paired mutations run inside one database transaction. Every write is
//! an `update_many` filtered on the expected pre-state; a zero
//! `rows_affected` means another writer got there first and the unit is
//! rolled back.
//!
//! Each unit starts with its conditional write. On SQLite in WAL mode a
//! transaction that reads first cannot later upgrade to a writer once another
//! connection has committed, so reads only follow the first write.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::domain::locker::LockerStatus;
use crate::domain::reservation::{
    CloseOutcome, Reservation, ReservationRepository, ReservationStatus,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{locker, reservation};

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    let status = ReservationStatus::parse(&m.status).ok_or_else(|| {
        DomainError::Internal(format!("Unknown reservation status '{}'", m.status))
    })?;
    Ok(Reservation {
        id: m.id,
        user_id: m.user_id,
        locker_id: m.locker_id,
        duration_hours: m.duration_hours,
        total_price: m.total_price,
        status,
        created_at: m.created_at,
        expires_at: m.expires_at,
        reminder_sent_at: m.reminder_sent_at,
        closed_at: m.closed_at,
    })
}

fn models_to_domain(models: Vec<reservation::Model>) -> DomainResult<Vec<Reservation>> {
    models.into_iter().map(model_to_domain).collect()
}

fn domain_to_active(r: &Reservation) -> reservation::ActiveModel {
    reservation::ActiveModel {
        id: Set(r.id.clone()),
        user_id: Set(r.user_id.clone()),
        locker_id: Set(r.locker_id.clone()),
        duration_hours: Set(r.duration_hours),
        total_price: Set(r.total_price),
        status: Set(r.status.as_str().to_string()),
        created_at: Set(r.created_at),
        expires_at: Set(r.expires_at),
        reminder_sent_at: Set(r.reminder_sent_at),
        closed_at: Set(r.closed_at),
    }
}

const ACTIVE: &str = "Active";

/// Reserved -> Available for lockers no Active reservation still points at.
async fn release_lockers(
    txn: &DatabaseTransaction,
    locker_ids: Vec<String>,
    at: DateTime<Utc>,
) -> DomainResult<u64> {
    let still_held = Query::select()
        .column(reservation::Column::LockerId)
        .from(reservation::Entity)
        .and_where(reservation::Column::Status.eq(ACTIVE))
        .to_owned();

    let result = locker::Entity::update_many()
        .col_expr(
            locker::Column::Status,
            Expr::value(LockerStatus::Available.as_str()),
        )
        .col_expr(locker::Column::UpdatedAt, Expr::value(at))
        .filter(locker::Column::Id.is_in(locker_ids))
        .filter(locker::Column::Status.eq(LockerStatus::Reserved.as_str()))
        .filter(locker::Column::Id.not_in_subquery(still_held))
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .order_by_desc(reservation::Column::CreatedAt)
            .order_by_desc(reservation::Column::Id)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .order_by_desc(reservation::Column::CreatedAt)
            .order_by_desc(reservation::Column::Id)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn find_by_locker(&self, locker_id: &str) -> DomainResult<Option<Reservation>> {
        let active = reservation::Entity::find()
            .filter(reservation::Column::LockerId.eq(locker_id))
            .filter(reservation::Column::Status.eq(ACTIVE))
            .one(&self.db)
            .await?;
        if let Some(model) = active {
            return model_to_domain(model).map(Some);
        }

        reservation::Entity::find()
            .filter(reservation::Column::LockerId.eq(locker_id))
            .order_by_desc(reservation::Column::CreatedAt)
            .order_by_desc(reservation::Column::Id)
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_reminder_candidates(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ACTIVE))
            .filter(reservation::Column::ReminderSentAt.is_null())
            .filter(reservation::Column::ExpiresAt.gt(now))
            .filter(reservation::Column::ExpiresAt.lte(until))
            .order_by_asc(reservation::Column::ExpiresAt)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn open(&self, r: &Reservation) -> DomainResult<bool> {
        debug!("Opening reservation {} on locker {}", r.id, r.locker_id);

        let txn = self.db.begin().await?;

        let flipped = locker::Entity::update_many()
            .col_expr(
                locker::Column::Status,
                Expr::value(LockerStatus::Reserved.as_str()),
            )
            .col_expr(locker::Column::UpdatedAt, Expr::value(r.created_at))
            .filter(locker::Column::Id.eq(r.locker_id.as_str()))
            .filter(locker::Column::Status.eq(LockerStatus::Available.as_str()))
            .exec(&txn)
            .await?;

        if flipped.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        domain_to_active(r).insert(&txn).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn close(
        &self,
        id: &str,
        to: ReservationStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<CloseOutcome> {
        debug!("Closing reservation {} as {}", id, to);

        let txn = self.db.begin().await?;

        let closed = reservation::Entity::update_many()
            .col_expr(reservation::Column::Status, Expr::value(to.as_str()))
            .col_expr(reservation::Column::ClosedAt, Expr::value(at))
            .filter(reservation::Column::Id.eq(id))
            .filter(reservation::Column::Status.eq(ACTIVE))
            .exec(&txn)
            .await?;

        if closed.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(CloseOutcome::NotActive);
        }

        let Some(model) = reservation::Entity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(CloseOutcome::NotActive);
        };

        let released = release_lockers(&txn, vec![model.locker_id.clone()], at).await?;
        if released == 0 {
            if locker::Entity::find_by_id(model.locker_id.as_str())
                .one(&txn)
                .await?
                .is_none()
            {
                error!(
                    "Reservation {} references missing locker {}",
                    id, model.locker_id
                );
                txn.rollback().await?;
                return Err(DomainError::Internal(format!(
                    "Locker {} referenced by reservation {} does not exist",
                    model.locker_id, id
                )));
            }
            warn!(
                "Locker {} of closed reservation {} was not Reserved",
                model.locker_id, id
            );
        }

        txn.commit().await?;
        model_to_domain(model).map(CloseOutcome::Closed)
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        let txn = self.db.begin().await?;

        let flipped = reservation::Entity::update_many()
            .col_expr(
                reservation::Column::Status,
                Expr::value(ReservationStatus::Expired.as_str()),
            )
            .col_expr(reservation::Column::ClosedAt, Expr::value(now))
            .filter(reservation::Column::Status.eq(ACTIVE))
            .filter(reservation::Column::ExpiresAt.lte(now))
            .exec(&txn)
            .await?;

        if flipped.rows_affected == 0 {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        // Rows flipped above carry `closed_at = now`.
        let expired = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Expired.as_str()))
            .filter(reservation::Column::ClosedAt.eq(now))
            .filter(reservation::Column::ExpiresAt.lte(now))
            .order_by_asc(reservation::Column::ExpiresAt)
            .all(&txn)
            .await?;

        let locker_ids: Vec<String> = expired
            .iter()
            .map(|m| m.locker_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let existing: HashSet<String> = locker::Entity::find()
            .filter(locker::Column::Id.is_in(locker_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();

        for m in expired.iter().filter(|m| !existing.contains(&m.locker_id)) {
            warn!(
                "Expired reservation {} references missing locker {}",
                m.id, m.locker_id
            );
        }

        release_lockers(&txn, locker_ids, now).await?;

        txn.commit().await?;
        debug!("Expired {} reservations", expired.len());

        models_to_domain(expired)
    }

    async fn claim_reminder(&self, id: &str, at: DateTime<Utc>) -> DomainResult<bool> {
        let result = reservation::Entity::update_many()
            .col_expr(reservation::Column::ReminderSentAt, Expr::value(at))
            .filter(reservation::Column::Id.eq(id))
            .filter(reservation::Column::Status.eq(ACTIVE))
            .filter(reservation::Column::ReminderSentAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
