//! In-memory storage implementation
//!
//! All three repositories share one state behind a single async `RwLock`.
//! Every paired mutation runs under one write guard, which gives it the same
//! all-or-nothing, conditioned-on-pre-state behavior as the SQL transactions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::domain::{
    CloseOutcome, DomainError, DomainResult, Locker, LockerRepository, LockerStatus, LockerUpdate,
    RepositoryProvider, Reservation, ReservationRepository, ReservationStatus, User,
    UserRepository,
};

#[derive(Default)]
struct MemoryState {
    lockers: HashMap<String, Locker>,
    reservations: HashMap<String, Reservation>,
    users: HashMap<String, User>,
}

#[derive(Clone, Default)]
struct Shared {
    state: Arc<RwLock<MemoryState>>,
    offline: Arc<AtomicBool>,
}

impl Shared {
    fn check_online(&self) -> DomainResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DomainError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

/// In-memory repositories for development and testing
pub struct InMemoryRepositoryProvider {
    shared: Shared,
    lockers: MemoryLockerRepository,
    reservations: MemoryReservationRepository,
    users: MemoryUserRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        let shared = Shared::default();
        Self {
            lockers: MemoryLockerRepository {
                shared: shared.clone(),
            },
            reservations: MemoryReservationRepository {
                shared: shared.clone(),
            },
            users: MemoryUserRepository {
                shared: shared.clone(),
            },
            shared,
        }
    }

    /// Simulate an unreachable store: every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Drop a locker without checking references, leaving its reservations dangling.
    #[cfg(test)]
    pub(crate) async fn remove_locker_unchecked(&self, id: &str) {
        self.shared.state.write().await.lockers.remove(id);
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn lockers(&self) -> &dyn LockerRepository {
        &self.lockers
    }

    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }

    fn users(&self) -> &dyn UserRepository {
        &self.users
    }
}

fn newest_first(mut items: Vec<Reservation>) -> Vec<Reservation> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    items
}

// ── Lockers ─────────────────────────────────────────────────────

struct MemoryLockerRepository {
    shared: Shared,
}

#[async_trait]
impl LockerRepository for MemoryLockerRepository {
    async fn save(&self, locker: Locker) -> DomainResult<()> {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        if state.lockers.values().any(|l| l.number == locker.number) {
            return Err(DomainError::Conflict(format!(
                "Locker number {} already exists",
                locker.number
            )));
        }
        state.lockers.insert(locker.id.clone(), locker);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Locker>> {
        self.shared.check_online()?;
        Ok(self.shared.state.read().await.lockers.get(id).cloned())
    }

    async fn find_by_number(&self, number: i32) -> DomainResult<Option<Locker>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(state.lockers.values().find(|l| l.number == number).cloned())
    }

    async fn find_all(&self) -> DomainResult<Vec<Locker>> {
        self.shared.check_online()?;
        let mut lockers: Vec<Locker> =
            self.shared.state.read().await.lockers.values().cloned().collect();
        lockers.sort_by_key(|l| l.number);
        Ok(lockers)
    }

    async fn find_by_status(&self, status: LockerStatus) -> DomainResult<Vec<Locker>> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|l| l.status == status)
            .collect())
    }

    async fn update_details(&self, id: &str, update: LockerUpdate) -> DomainResult<Option<Locker>> {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        if let Some(number) = update.number {
            if state.lockers.values().any(|l| l.number == number && l.id != id) {
                return Err(DomainError::Conflict(format!(
                    "Locker number {} already exists",
                    number
                )));
            }
        }
        let Some(locker) = state.lockers.get_mut(id) else {
            return Ok(None);
        };
        if let Some(number) = update.number {
            locker.number = number;
        }
        if let Some(size) = update.size {
            locker.size = size;
        }
        if let Some(price) = update.hourly_price {
            locker.hourly_price = price;
        }
        locker.updated_at = Utc::now();
        Ok(Some(locker.clone()))
    }

    async fn delete_if_unused(&self, id: &str) -> DomainResult<bool> {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        let Some(locker) = state.lockers.get(id) else {
            return Err(DomainError::not_found("Locker", "id", id));
        };
        let referenced = state.reservations.values().any(|r| r.locker_id == id);
        if !locker.is_available() || referenced {
            return Ok(false);
        }
        state.lockers.remove(id);
        Ok(true)
    }
}

// ── Reservations ────────────────────────────────────────────────

struct MemoryReservationRepository {
    shared: Shared,
}

#[async_trait]
impl ReservationRepository for MemoryReservationRepository {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Reservation>> {
        self.shared.check_online()?;
        Ok(self.shared.state.read().await.reservations.get(id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(newest_first(
            state
                .reservations
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn find_all(&self) -> DomainResult<Vec<Reservation>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(newest_first(state.reservations.values().cloned().collect()))
    }

    async fn find_by_locker(&self, locker_id: &str) -> DomainResult<Option<Reservation>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        let history = newest_first(
            state
                .reservations
                .values()
                .filter(|r| r.locker_id == locker_id)
                .cloned()
                .collect(),
        );
        let active = history.iter().find(|r| r.is_active()).cloned();
        Ok(active.or_else(|| history.into_iter().next()))
    }

    async fn find_reminder_candidates(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.needs_reminder(now, until - now))
            .cloned()
            .collect())
    }

    async fn open(&self, reservation: &Reservation) -> DomainResult<bool> {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        match state.lockers.get_mut(&reservation.locker_id) {
            Some(locker) if locker.status == LockerStatus::Available => {
                locker.status = LockerStatus::Reserved;
                locker.updated_at = reservation.created_at;
            }
            _ => return Ok(false),
        }
        state
            .reservations
            .insert(reservation.id.clone(), reservation.clone());
        Ok(true)
    }

    async fn close(
        &self,
        id: &str,
        to: ReservationStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<CloseOutcome> {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        let locker_id = match state.reservations.get(id) {
            Some(r) if r.is_active() => r.locker_id.clone(),
            _ => return Ok(CloseOutcome::NotActive),
        };
        let Some(locker) = state.lockers.get_mut(&locker_id) else {
            error!(reservation_id = id, locker_id = %locker_id, "Active reservation references a missing locker");
            return Err(DomainError::Internal(format!(
                "Locker {} referenced by reservation {} does not exist",
                locker_id, id
            )));
        };
        if locker.status != LockerStatus::Reserved {
            warn!(locker_id = %locker_id, "Locker of an active reservation was not Reserved");
        }
        locker.status = LockerStatus::Available;
        locker.updated_at = at;

        let Some(reservation) = state.reservations.get_mut(id) else {
            return Ok(CloseOutcome::NotActive);
        };
        reservation.status = to;
        reservation.closed_at = Some(at);
        Ok(CloseOutcome::Closed(reservation.clone()))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        self.shared.check_online()?;
        let mut guard = self.shared.state.write().await;
        let state = &mut *guard;
        let mut expired = Vec::new();
        for reservation in state.reservations.values_mut().filter(|r| r.is_due(now)) {
            reservation.status = ReservationStatus::Expired;
            reservation.closed_at = Some(now);
            match state.lockers.get_mut(&reservation.locker_id) {
                Some(locker) if locker.status == LockerStatus::Reserved => {
                    locker.status = LockerStatus::Available;
                    locker.updated_at = now;
                }
                Some(_) => {}
                None => warn!(
                    reservation_id = %reservation.id,
                    locker_id = %reservation.locker_id,
                    "Expired reservation references a missing locker"
                ),
            }
            expired.push(reservation.clone());
        }
        Ok(expired)
    }

    async fn claim_reminder(&self, id: &str, at: DateTime<Utc>) -> DomainResult<bool> {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        match state.reservations.get_mut(id) {
            Some(r) if r.is_active() && r.reminder_sent_at.is_none() => {
                r.reminder_sent_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ── Users ───────────────────────────────────────────────────────

struct MemoryUserRepository {
    shared: Shared,
}

impl MemoryUserRepository {
    async fn modify<F>(&self, id: &str, f: F) -> DomainResult<()>
    where
        F: FnOnce(&mut User) + Send,
    {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        let user = state
            .users
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("User", "id", id))?;
        f(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: User) -> DomainResult<()> {
        self.shared.check_online()?;
        let mut state = self.shared.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(DomainError::Conflict("Username or email already exists".into()));
        }
        state.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        self.shared.check_online()?;
        Ok(self.shared.state.read().await.users.get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> DomainResult<Vec<User>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_login(&self, login: &str) -> DomainResult<Option<User>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    async fn find_all(&self) -> DomainResult<Vec<User>> {
        self.shared.check_online()?;
        let mut users: Vec<User> = self.shared.state.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn count(&self) -> DomainResult<u64> {
        self.shared.check_online()?;
        Ok(self.shared.state.read().await.users.len() as u64)
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.modify(id, |u| u.last_login_at = Some(at)).await
    }

    async fn bump_session_version(&self, id: &str) -> DomainResult<()> {
        self.modify(id, |u| u.session_version += 1).await
    }

    async fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let token_hash = token_hash.to_string();
        self.modify(id, move |u| {
            u.reset_token_hash = Some(token_hash);
            u.reset_token_expires_at = Some(expires_at);
        })
        .await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> DomainResult<Option<User>> {
        self.shared.check_online()?;
        let state = self.shared.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn reset_password(&self, id: &str, password_hash: &str) -> DomainResult<()> {
        let password_hash = password_hash.to_string();
        self.modify(id, move |u| {
            u.password_hash = password_hash;
            u.reset_token_hash = None;
            u.reset_token_expires_at = None;
            u.session_version += 1;
        })
        .await
    }
}
