//! SeaORM implementation of LockerRepository

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::domain::locker::{Locker, LockerRepository, LockerSize, LockerStatus, LockerUpdate};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{locker, reservation};

pub struct SeaOrmLockerRepository {
    db: DatabaseConnection,
}

impl SeaOrmLockerRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: locker::Model) -> DomainResult<Locker> {
    let size = LockerSize::parse(&m.size)
        .ok_or_else(|| DomainError::Internal(format!("Unknown locker size '{}'", m.size)))?;
    let status = LockerStatus::parse(&m.status)
        .ok_or_else(|| DomainError::Internal(format!("Unknown locker status '{}'", m.status)))?;
    Ok(Locker {
        id: m.id,
        number: m.number,
        size,
        hourly_price: m.hourly_price,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<locker::Model>) -> DomainResult<Vec<Locker>> {
    models.into_iter().map(model_to_domain).collect()
}

fn unique_violation(e: sea_orm::DbErr, number: i32) -> DomainError {
    if e.to_string().contains("UNIQUE") || e.to_string().contains("duplicate") {
        DomainError::Conflict(format!("Locker number {} already exists", number))
    } else {
        e.into()
    }
}

// ── LockerRepository impl ───────────────────────────────────────

#[async_trait]
impl LockerRepository for SeaOrmLockerRepository {
    async fn save(&self, l: Locker) -> DomainResult<()> {
        debug!("Saving locker: {} (#{})", l.id, l.number);

        let number = l.number;
        let model = locker::ActiveModel {
            id: Set(l.id),
            number: Set(l.number),
            size: Set(l.size.as_str().to_string()),
            hourly_price: Set(l.hourly_price),
            status: Set(l.status.as_str().to_string()),
            created_at: Set(l.created_at),
            updated_at: Set(l.updated_at),
        };
        model
            .insert(&self.db)
            .await
            .map_err(|e| unique_violation(e, number))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Locker>> {
        locker::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_number(&self, number: i32) -> DomainResult<Option<Locker>> {
        locker::Entity::find()
            .filter(locker::Column::Number.eq(number))
            .one(&self.db)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_all(&self) -> DomainResult<Vec<Locker>> {
        let models = locker::Entity::find()
            .order_by_asc(locker::Column::Number)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn find_by_status(&self, status: LockerStatus) -> DomainResult<Vec<Locker>> {
        let models = locker::Entity::find()
            .filter(locker::Column::Status.eq(status.as_str()))
            .order_by_asc(locker::Column::Number)
            .all(&self.db)
            .await?;
        models_to_domain(models)
    }

    async fn update_details(&self, id: &str, update: LockerUpdate) -> DomainResult<Option<Locker>> {
        debug!("Updating locker: {}", id);

        let Some(existing) = locker::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut active: locker::ActiveModel = existing.into();
        if let Some(number) = update.number {
            active.number = Set(number);
        }
        if let Some(size) = update.size {
            active.size = Set(size.as_str().to_string());
        }
        if let Some(price) = update.hourly_price {
            active.hourly_price = Set(price);
        }
        active.updated_at = Set(Utc::now());

        let number = update.number.unwrap_or_default();
        let model = active
            .update(&self.db)
            .await
            .map_err(|e| unique_violation(e, number))?;
        model_to_domain(model).map(Some)
    }

    async fn delete_if_unused(&self, id: &str) -> DomainResult<bool> {
        debug!("Deleting locker: {}", id);

        let txn = self.db.begin().await?;

        let Some(existing) = locker::Entity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Err(DomainError::not_found("Locker", "id", id));
        };

        let references = reservation::Entity::find()
            .filter(reservation::Column::LockerId.eq(id))
            .count(&txn)
            .await?;

        if existing.status != LockerStatus::Available.as_str() || references > 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        let result = locker::Entity::delete_many()
            .filter(locker::Column::Id.eq(id))
            .filter(locker::Column::Status.eq(LockerStatus::Available.as_str()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        txn.commit().await?;
        Ok(true)
    }
}
