//! SeaORM implementation of UserRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::domain::{DomainError, DomainResult, User, UserRepository, UserRole};
use crate::infrastructure::database::entities::user;

pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn update_where_id(
        &self,
        id: &str,
        update: sea_orm::UpdateMany<user::Entity>,
    ) -> DomainResult<()> {
        let result = update
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(DomainError::not_found("User", "id", id));
        }
        Ok(())
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn entity_role_to_domain(role: user::UserRole) -> UserRole {
    match role {
        user::UserRole::Admin => UserRole::Admin,
        user::UserRole::Customer => UserRole::Customer,
    }
}

fn domain_role_to_entity(role: UserRole) -> user::UserRole {
    match role {
        UserRole::Admin => user::UserRole::Admin,
        UserRole::Customer => user::UserRole::Customer,
    }
}

fn user_model_to_domain(model: user::Model) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        password_hash: model.password_hash,
        role: entity_role_to_domain(model.role),
        is_active: model.is_active,
        session_version: model.session_version,
        reset_token_hash: model.reset_token_hash,
        reset_token_expires_at: model.reset_token_expires_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
        last_login_at: model.last_login_at,
    }
}

// ── Repository implementation ───────────────────────────────────

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn create(&self, u: User) -> DomainResult<()> {
        debug!("Creating user: {}", u.username);

        let new_user = user::ActiveModel {
            id: Set(u.id),
            username: Set(u.username),
            email: Set(u.email),
            password_hash: Set(u.password_hash),
            role: Set(domain_role_to_entity(u.role)),
            is_active: Set(u.is_active),
            session_version: Set(u.session_version),
            reset_token_hash: Set(u.reset_token_hash),
            reset_token_expires_at: Set(u.reset_token_expires_at),
            created_at: Set(u.created_at),
            updated_at: Set(u.updated_at),
            last_login_at: Set(u.last_login_at),
        };

        new_user.insert(&self.db).await.map_err(|e| {
            if e.to_string().contains("UNIQUE") || e.to_string().contains("duplicate") {
                DomainError::Conflict("Username or email already exists".to_string())
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(user_model_to_domain))
    }

    async fn find_by_ids(&self, ids: &[String]) -> DomainResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().cloned()))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(user_model_to_domain).collect())
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(model.map(user_model_to_domain))
    }

    async fn find_by_login(&self, login: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(login))
                    .add(user::Column::Email.eq(login)),
            )
            .one(&self.db)
            .await?;
        Ok(model.map(user_model_to_domain))
    }

    async fn find_all(&self) -> DomainResult<Vec<User>> {
        let models = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(user_model_to_domain).collect())
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(user::Entity::find().count(&self.db).await?)
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.update_where_id(
            id,
            user::Entity::update_many().col_expr(user::Column::LastLoginAt, Expr::value(at)),
        )
        .await
    }

    async fn bump_session_version(&self, id: &str) -> DomainResult<()> {
        self.update_where_id(
            id,
            user::Entity::update_many().col_expr(
                user::Column::SessionVersion,
                Expr::col(user::Column::SessionVersion).add(1),
            ),
        )
        .await
    }

    async fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.update_where_id(
            id,
            user::Entity::update_many()
                .col_expr(user::Column::ResetTokenHash, Expr::value(token_hash))
                .col_expr(user::Column::ResetTokenExpiresAt, Expr::value(expires_at)),
        )
        .await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::ResetTokenHash.eq(token_hash))
            .one(&self.db)
            .await?;
        Ok(model.map(user_model_to_domain))
    }

    async fn reset_password(&self, id: &str, password_hash: &str) -> DomainResult<()> {
        self.update_where_id(
            id,
            user::Entity::update_many()
                .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
                .col_expr(
                    user::Column::ResetTokenHash,
                    Expr::value(Option::<String>::None),
                )
                .col_expr(
                    user::Column::ResetTokenExpiresAt,
                    Expr::value(Option::<DateTime<Utc>>::None),
                )
                .col_expr(
                    user::Column::SessionVersion,
                    Expr::col(user::Column::SessionVersion).add(1),
                ),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::infrastructure::database::test_support::migrated_db;

    #[tokio::test]
    async fn test_create_and_find_by_login() {
        let repo = SeaOrmUserRepository::new(migrated_db().await);
        let user = User::new("bob", "bob@example.com", "hash", UserRole::Admin, Utc::now());
        repo.create(user.clone()).await.unwrap();

        let by_name = repo.find_by_login("bob").await.unwrap().unwrap();
        let by_mail = repo.find_by_login("bob@example.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_mail.id, user.id);
        assert_eq!(by_name.role, UserRole::Admin);
        assert_eq!(repo.count().await.unwrap(), 1);

        let dup = User::new("bob", "other@example.com", "hash", UserRole::Customer, Utc::now());
        assert!(matches!(repo.create(dup).await, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_reset_password_clears_token_and_bumps_version() {
        let repo = SeaOrmUserRepository::new(migrated_db().await);
        let user = User::new("carol", "carol@example.com", "old", UserRole::Customer, Utc::now());
        let id = user.id.clone();
        repo.create(user).await.unwrap();

        repo.set_reset_token(&id, "digest", Utc::now() + Duration::minutes(30))
            .await
            .unwrap();
        let found = repo.find_by_reset_token("digest").await.unwrap().unwrap();
        assert_eq!(found.id, id);

        repo.reset_password(&id, "new").await.unwrap();
        let updated = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "new");
        assert_eq!(updated.session_version, 1);
        assert!(updated.reset_token_hash.is_none());
        assert!(repo.find_by_reset_token("digest").await.unwrap().is_none());

        repo.bump_session_version(&id).await.unwrap();
        assert_eq!(repo.find_by_id(&id).await.unwrap().unwrap().session_version, 2);
        assert!(matches!(
            repo.bump_session_version("missing").await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
