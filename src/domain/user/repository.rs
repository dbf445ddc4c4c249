use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::User;
use crate::domain::DomainResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. `Conflict` when username or email is taken.
    async fn create(&self, user: User) -> DomainResult<()>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<User>>;
    async fn find_by_ids(&self, ids: &[String]) -> DomainResult<Vec<User>>;
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;
    /// Match on username or email
    async fn find_by_login(&self, login: &str) -> DomainResult<Option<User>>;
    async fn find_all(&self) -> DomainResult<Vec<User>>;
    async fn count(&self) -> DomainResult<u64>;

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()>;

    /// Increment the session version, invalidating outstanding tokens.
    async fn bump_session_version(&self, id: &str) -> DomainResult<()>;

    async fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()>;

    async fn find_by_reset_token(&self, token_hash: &str) -> DomainResult<Option<User>>;

    /// Replace the password, clear the reset token and bump the session version.
    async fn reset_password(&self, id: &str, password_hash: &str) -> DomainResult<()>;
}
