//! User management service: application-layer orchestration
//!
//! HTTP handlers are thin wrappers that delegate here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::application::bounded::notify_best_effort;
use crate::application::reservations::Caller;
use crate::domain::{
    DomainError, DomainResult, RepositoryProvider, SharedNotifier, User, UserRole,
};
use crate::infrastructure::crypto::{
    create_token, generate_reset_token, hash_password, hash_reset_token, verify_password,
    verify_token, JwtConfig, TokenSubject,
};
use crate::shared::time::SharedClock;

#[derive(Clone)]
pub struct IdentitySettings {
    pub jwt: JwtConfig,
    pub bcrypt_cost: u32,
    pub reset_token_ttl: chrono::Duration,
    /// Base URL of the web client; reset links point at `{frontend_url}/reset-password`
    pub frontend_url: String,
    pub notify_timeout: Duration,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            reset_token_ttl: chrono::Duration::minutes(30),
            frontend_url: "http://localhost:3000".to_string(),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

/// Authentication result returned after a successful login
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// The identity behind a validated bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
        }
    }
}

pub struct IdentityService {
    repos: Arc<dyn RepositoryProvider>,
    notifier: SharedNotifier,
    clock: SharedClock,
    settings: IdentitySettings,
}

impl IdentityService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        notifier: SharedNotifier,
        clock: SharedClock,
        settings: IdentitySettings,
    ) -> Self {
        Self {
            repos,
            notifier,
            clock,
            settings,
        }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.settings.jwt
    }

    // ── Registration ────────────────────────────────────────────

    /// Register a new customer account.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> DomainResult<User> {
        let user = self
            .create_user(username, email, password, UserRole::Customer)
            .await?;

        notify_best_effort(
            self.notifier.as_ref(),
            self.settings.notify_timeout,
            &user.email,
            "Welcome to the locker service",
            &format!("Hello {}, your account is ready.", user.username),
        )
        .await;

        info!(user_id = %user.id, username = %user.username, "New user registered");
        Ok(user)
    }

    /// Create the configured admin account when no user exists yet.
    /// Returns `true` if an account was created.
    pub async fn ensure_default_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> DomainResult<bool> {
        if self.repos.users().count().await? > 0 {
            return Ok(false);
        }
        info!("Creating default admin user...");
        let admin = self
            .create_user(username, email, password, UserRole::Admin)
            .await?;
        info!(email = %admin.email, "Default admin created");
        warn!("Please change the default admin password immediately");
        Ok(true)
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> DomainResult<User> {
        let username = username.trim();
        let email = email.trim().to_lowercase();

        if username.len() < 3 || username.len() > 50 {
            return Err(DomainError::InvalidArgument(
                "Username must be 3-50 characters".into(),
            ));
        }
        validate_password(password)?;
        if !email.contains('@') {
            return Err(DomainError::InvalidArgument("Invalid email address".into()));
        }

        if self.repos.users().find_by_login(username).await?.is_some() {
            return Err(DomainError::Conflict("Username already exists".into()));
        }
        if self.repos.users().find_by_email(&email).await?.is_some() {
            return Err(DomainError::Conflict("Email already exists".into()));
        }

        let password_hash = self.hash(password)?;
        let user = User::new(username, email, password_hash, role, self.clock.now());
        self.repos.users().create(user.clone()).await?;
        Ok(user)
    }

    // ── Authentication ──────────────────────────────────────────

    /// Authenticate by username/email + password and return a JWT.
    pub async fn login(&self, login: &str, password: &str) -> DomainResult<AuthResult> {
        let login = login.trim();
        let user = match self.repos.users().find_by_login(login).await? {
            Some(user) => Some(user),
            None => self.repos.users().find_by_email(&login.to_lowercase()).await?,
        };

        let Some(user) = user else {
            return Err(DomainError::Unauthorized("Invalid credentials".into()));
        };

        if !user.is_active {
            return Err(DomainError::Unauthorized("Account is disabled".into()));
        }

        let valid = verify_password(password, &user.password_hash).unwrap_or(false);
        if !valid {
            return Err(DomainError::Unauthorized("Invalid credentials".into()));
        }

        let token = create_token(subject(&user), &self.settings.jwt)
            .map_err(|e| DomainError::Internal(format!("Failed to create token: {}", e)))?;

        self.repos
            .users()
            .touch_last_login(&user.id, self.clock.now())
            .await?;

        info!(user_id = %user.id, "User logged in");
        Ok(AuthResult {
            token,
            token_type: "Bearer".into(),
            expires_in: self.settings.jwt.expiration_hours * 3600,
            user,
        })
    }

    /// Resolve a bearer token. Tokens minted before the user's last logout
    /// or password reset are rejected.
    pub async fn authenticate(&self, token: &str) -> DomainResult<AuthenticatedUser> {
        let claims = verify_token(token, &self.settings.jwt)
            .map_err(|e| DomainError::Unauthorized(format!("Invalid token: {}", e)))?;

        let user = self
            .repos
            .users()
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| DomainError::Unauthorized("Unknown user".into()))?;

        if !user.is_active {
            return Err(DomainError::Unauthorized("Account is disabled".into()));
        }
        if user.session_version != claims.ver {
            return Err(DomainError::Unauthorized("Session has ended".into()));
        }

        Ok(AuthenticatedUser {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        })
    }

    /// End every session of the user.
    pub async fn logout(&self, user_id: &str) -> DomainResult<()> {
        self.repos.users().bump_session_version(user_id).await?;
        info!(user_id, "User logged out");
        Ok(())
    }

    // ── Password reset ──────────────────────────────────────────

    /// Issue a single-use reset token and mail the reset link.
    pub async fn forgot_password(&self, email: &str) -> DomainResult<()> {
        let email = email.trim().to_lowercase();
        let user = self
            .repos
            .users()
            .find_by_email(&email)
            .await?
            .ok_or_else(|| DomainError::not_found("User", "email", email.clone()))?;

        let reset = generate_reset_token();
        let expires_at = self.clock.now() + self.settings.reset_token_ttl;
        self.repos
            .users()
            .set_reset_token(&user.id, &reset.hash, expires_at)
            .await?;

        let link = format!(
            "{}/reset-password?token={}",
            self.settings.frontend_url.trim_end_matches('/'),
            reset.token
        );
        notify_best_effort(
            self.notifier.as_ref(),
            self.settings.notify_timeout,
            &user.email,
            "Password reset procedure",
            &format!("Click here to reset your password: {}", link),
        )
        .await;

        info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> DomainResult<()> {
        validate_password(new_password)?;

        let user = self
            .repos
            .users()
            .find_by_reset_token(&hash_reset_token(token))
            .await?
            .ok_or_else(|| DomainError::Unauthorized("Invalid or expired reset token".into()))?;

        let expired = user
            .reset_token_expires_at
            .map_or(true, |at| at <= self.clock.now());
        if expired {
            return Err(DomainError::Unauthorized(
                "Invalid or expired reset token".into(),
            ));
        }

        let password_hash = self.hash(new_password)?;
        self.repos
            .users()
            .reset_password(&user.id, &password_hash)
            .await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────

    pub async fn me(&self, user_id: &str) -> DomainResult<User> {
        self.repos
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", "id", user_id))
    }

    pub async fn list_users(&self) -> DomainResult<Vec<User>> {
        self.repos.users().find_all().await
    }

    fn hash(&self, password: &str) -> DomainResult<String> {
        hash_password(password, self.settings.bcrypt_cost)
            .map_err(|e| DomainError::Internal(format!("Failed to hash password: {}", e)))
    }
}

// ── Helpers ─────────────────────────────────────────────────────

fn subject(user: &User) -> TokenSubject<'_> {
    TokenSubject {
        user_id: &user.id,
        username: &user.username,
        email: &user.email,
        role: user.role.as_str(),
        session_version: user.session_version,
    }
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.len() < 8 {
        return Err(DomainError::InvalidArgument(
            "Password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::infrastructure::notifier::testing::RecordingNotifier;
    use crate::infrastructure::InMemoryRepositoryProvider;
    use crate::shared::time::ManualClock;

    pub(crate) fn fast_settings() -> IdentitySettings {
        IdentitySettings {
            jwt: JwtConfig::new("test-secret", 1),
            bcrypt_cost: crate::infrastructure::crypto::MIN_BCRYPT_COST,
            notify_timeout: std::time::Duration::from_millis(200),
            ..IdentitySettings::default()
        }
    }

    struct Ctx {
        identity: IdentityService,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    fn ctx() -> Ctx {
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let identity = IdentityService::new(
            Arc::new(InMemoryRepositoryProvider::new()),
            notifier.clone(),
            clock.clone(),
            fast_settings(),
        );
        Ctx {
            identity,
            notifier,
            clock,
        }
    }

    fn reset_token_from(notifier: &RecordingNotifier) -> String {
        let sent = notifier.sent();
        let body = &sent.last().unwrap().body;
        body.split("token=").nth(1).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let c = ctx();
        let user = c
            .identity
            .register("alice", "Alice@Example.com", "password1")
            .await
            .unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, UserRole::Customer);
        assert_ne!(user.password_hash, "password1");
        assert_eq!(c.notifier.sent()[0].subject, "Welcome to the locker service");

        let by_name = c.identity.login("alice", "password1").await.unwrap();
        let by_mail = c.identity.login("alice@example.com", "password1").await.unwrap();
        assert_eq!(by_name.user.id, user.id);
        assert_eq!(by_mail.token_type, "Bearer");

        let who = c.identity.authenticate(&by_name.token).await.unwrap();
        assert_eq!(who.user_id, user.id);
        assert!(!who.is_admin());
        assert_eq!(who.caller().email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_register_validation_and_conflicts() {
        let c = ctx();
        for (name, email, pw) in [
            ("al", "al@example.com", "password1"),
            ("alice", "no-at-sign", "password1"),
            ("alice", "alice@example.com", "short"),
        ] {
            assert!(matches!(
                c.identity.register(name, email, pw).await,
                Err(DomainError::InvalidArgument(_))
            ));
        }
        c.identity.register("alice", "alice@example.com", "password1").await.unwrap();
        assert!(matches!(
            c.identity.register("alice", "other@example.com", "password1").await,
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            c.identity.register("alice2", "alice@example.com", "password1").await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let c = ctx();
        c.identity.register("bob", "bob@example.com", "password1").await.unwrap();
        assert!(matches!(
            c.identity.login("bob", "wrong-password").await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            c.identity.login("nobody", "password1").await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            c.identity.authenticate("garbage").await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_outstanding_tokens() {
        let c = ctx();
        let user = c.identity.register("carol", "carol@example.com", "password1").await.unwrap();
        let auth = c.identity.login("carol", "password1").await.unwrap();
        assert!(c.identity.authenticate(&auth.token).await.is_ok());

        c.identity.logout(&user.id).await.unwrap();
        assert!(matches!(
            c.identity.authenticate(&auth.token).await,
            Err(DomainError::Unauthorized(_))
        ));

        let again = c.identity.login("carol", "password1").await.unwrap();
        assert!(c.identity.authenticate(&again.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let c = ctx();
        c.identity.register("dave", "dave@example.com", "password1").await.unwrap();
        let old = c.identity.login("dave", "password1").await.unwrap();

        c.identity.forgot_password("dave@example.com").await.unwrap();
        let token = reset_token_from(&c.notifier);
        assert_eq!(token.len(), 64);

        assert!(matches!(
            c.identity.reset_password("not-the-token", "newpassword").await,
            Err(DomainError::Unauthorized(_))
        ));
        c.identity.reset_password(&token, "newpassword").await.unwrap();

        assert!(c.identity.login("dave", "password1").await.is_err());
        assert!(c.identity.login("dave", "newpassword").await.is_ok());
        // Old sessions and the used token are both dead.
        assert!(c.identity.authenticate(&old.token).await.is_err());
        assert!(c.identity.reset_password(&token, "another-pass").await.is_err());
    }

    #[tokio::test]
    async fn test_reset_token_expires() {
        let c = ctx();
        c.identity.register("erin", "erin@example.com", "password1").await.unwrap();
        c.identity.forgot_password("erin@example.com").await.unwrap();
        let token = reset_token_from(&c.notifier);

        c.clock.advance(Duration::minutes(31));
        assert!(matches!(
            c.identity.reset_password(&token, "newpassword").await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            c.identity.forgot_password("ghost@example.com").await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_default_admin_seeded_once() {
        let c = ctx();
        assert!(c
            .identity
            .ensure_default_admin("admin", "admin@example.com", "admin12345")
            .await
            .unwrap());
        assert!(!c
            .identity
            .ensure_default_admin("admin", "admin@example.com", "admin12345")
            .await
            .unwrap());

        let users = c.identity.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin());
        let me = c.identity.me(&users[0].id).await.unwrap();
        assert_eq!(me.username, "admin");
    }
}
