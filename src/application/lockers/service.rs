//! Locker administration
//!
//! Status is never changed here; only the reservation lifecycle moves a
//! locker between Available and Reserved.

use std::sync::Arc;

use tracing::info;

use crate::domain::{
    DomainError, DomainResult, Locker, LockerSize, LockerStatus, LockerUpdate, RepositoryProvider,
};
use crate::shared::time::SharedClock;

pub struct LockerService {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
}

impl LockerService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, clock: SharedClock) -> Self {
        Self { repos, clock }
    }

    pub async fn create(
        &self,
        number: i32,
        size: LockerSize,
        hourly_price: i64,
    ) -> DomainResult<Locker> {
        validate_number(number)?;
        validate_price(hourly_price)?;
        self.ensure_number_free(number, None).await?;

        let locker = Locker::new(number, size, hourly_price, self.clock.now());
        self.repos.lockers().save(locker.clone()).await?;
        info!(locker_id = %locker.id, number, "Locker created");
        Ok(locker)
    }

    /// All lockers ordered by number, optionally filtered by status
    pub async fn list(&self, status: Option<LockerStatus>) -> DomainResult<Vec<Locker>> {
        match status {
            Some(status) => self.repos.lockers().find_by_status(status).await,
            None => self.repos.lockers().find_all().await,
        }
    }

    pub async fn get(&self, id: &str) -> DomainResult<Locker> {
        self.repos
            .lockers()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Locker", "id", id))
    }

    pub async fn update(&self, id: &str, update: LockerUpdate) -> DomainResult<Locker> {
        if let Some(number) = update.number {
            validate_number(number)?;
            self.ensure_number_free(number, Some(id)).await?;
        }
        if let Some(price) = update.hourly_price {
            validate_price(price)?;
        }
        let locker = self
            .repos
            .lockers()
            .update_details(id, update)
            .await?
            .ok_or_else(|| DomainError::not_found("Locker", "id", id))?;
        info!(locker_id = %locker.id, "Locker updated");
        Ok(locker)
    }

    /// Delete a locker that is Available and has no reservation history
    pub async fn delete(&self, id: &str) -> DomainResult<()> {
        if !self.repos.lockers().delete_if_unused(id).await? {
            return Err(DomainError::Conflict(format!(
                "Locker {} is reserved or has reservation history",
                id
            )));
        }
        info!(locker_id = id, "Locker deleted");
        Ok(())
    }

    /// The unique index stays the backstop for concurrent creates.
    async fn ensure_number_free(&self, number: i32, except: Option<&str>) -> DomainResult<()> {
        match self.repos.lockers().find_by_number(number).await? {
            Some(other) if Some(other.id.as_str()) != except => Err(DomainError::Conflict(
                format!("Locker number {} already exists", number),
            )),
            _ => Ok(()),
        }
    }
}

fn validate_number(number: i32) -> DomainResult<()> {
    if number <= 0 {
        return Err(DomainError::InvalidArgument(
            "number must be a positive integer".into(),
        ));
    }
    Ok(())
}

fn validate_price(price: i64) -> DomainResult<()> {
    if price < 0 {
        return Err(DomainError::InvalidArgument(
            "hourly_price must not be negative".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reservations::test_support::harnesses;

    fn service(h: &crate::application::reservations::test_support::Harness) -> LockerService {
        LockerService::new(h.repos.clone(), h.clock.clone())
    }

    #[tokio::test]
    async fn test_create_list_and_filter() {
        for h in harnesses().await {
            let lockers = service(&h);
            let a = lockers.create(2, LockerSize::Small, 10).await.unwrap();
            lockers.create(1, LockerSize::Large, 30).await.unwrap();

            let all = lockers.list(None).await.unwrap();
            assert_eq!(all.iter().map(|l| l.number).collect::<Vec<_>>(), vec![1, 2], "{}", h.name);

            let caller = h.seed_user("alice").await;
            h.reservations.reserve(&caller, &a.id, 1).await.unwrap();
            let reserved = lockers.list(Some(LockerStatus::Reserved)).await.unwrap();
            assert_eq!(reserved.len(), 1);
            assert_eq!(reserved[0].id, a.id);
            assert_eq!(lockers.list(Some(LockerStatus::Available)).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_create_validates_and_rejects_duplicates() {
        for h in harnesses().await {
            let lockers = service(&h);
            assert!(matches!(
                lockers.create(0, LockerSize::Small, 10).await,
                Err(DomainError::InvalidArgument(_))
            ));
            assert!(matches!(
                lockers.create(1, LockerSize::Small, -1).await,
                Err(DomainError::InvalidArgument(_))
            ));
            lockers.create(1, LockerSize::Small, 10).await.unwrap();
            assert!(
                matches!(lockers.create(1, LockerSize::Medium, 10).await, Err(DomainError::Conflict(_))),
                "{}",
                h.name
            );
        }
    }

    #[tokio::test]
    async fn test_price_change_does_not_touch_existing_reservation() {
        for h in harnesses().await {
            let lockers = service(&h);
            let locker = lockers.create(5, LockerSize::Medium, 10).await.unwrap();
            let caller = h.seed_user("bob").await;
            let r = h.reservations.reserve(&caller, &locker.id, 2).await.unwrap();

            let updated = lockers
                .update(
                    &locker.id,
                    LockerUpdate {
                        hourly_price: Some(50),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(updated.hourly_price, 50);
            assert_eq!(updated.status, LockerStatus::Reserved, "{}", h.name);

            let stored = h.reservations.get_by_id(&r.id).await.unwrap();
            assert_eq!(stored.reservation.total_price, 20);
        }
    }

    #[tokio::test]
    async fn test_renumber_to_taken_number_conflicts() {
        for h in harnesses().await {
            let lockers = service(&h);
            let a = lockers.create(1, LockerSize::Small, 10).await.unwrap();
            lockers.create(2, LockerSize::Small, 10).await.unwrap();

            let taken = LockerUpdate {
                number: Some(2),
                ..Default::default()
            };
            assert!(
                matches!(lockers.update(&a.id, taken).await, Err(DomainError::Conflict(_))),
                "{}",
                h.name
            );

            let same = LockerUpdate {
                number: Some(1),
                ..Default::default()
            };
            assert_eq!(lockers.update(&a.id, same).await.unwrap().number, 1);
        }
    }

    #[tokio::test]
    async fn test_delete_rules() {
        for h in harnesses().await {
            let lockers = service(&h);
            let unused = lockers.create(1, LockerSize::Small, 10).await.unwrap();
            let used = lockers.create(2, LockerSize::Small, 10).await.unwrap();
            let caller = h.seed_user("carol").await;
            let r = h.reservations.reserve(&caller, &used.id, 1).await.unwrap();

            assert!(matches!(lockers.delete(&used.id).await, Err(DomainError::Conflict(_))));
            h.reservations.cancel(&r.id).await.unwrap();
            // History still references it.
            assert!(matches!(lockers.delete(&used.id).await, Err(DomainError::Conflict(_))));

            lockers.delete(&unused.id).await.unwrap();
            assert!(matches!(
                lockers.get(&unused.id).await,
                Err(DomainError::NotFound { .. })
            ), "{}", h.name);
            assert!(matches!(
                lockers.delete("missing").await,
                Err(DomainError::NotFound { .. })
            ));
        }
    }
}
