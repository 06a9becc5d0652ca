use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_ROLE: &str = "customer";

/// Returned (inside `anyhow::Error`) when a write hits the unique email index.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct EmailTaken;

fn email_write_error(e: sqlx::Error, what: &'static str) -> anyhow::Error {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => EmailTaken.into(),
        other => anyhow::Error::new(other).context(what),
    }
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image_key: Option<String>,
    pub role: Option<String>,
    pub password_hash: String, // Argon2 hash, never serialized
    pub token_version: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields a signed-in user may change about themselves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Fails with [`EmailTaken`] if the email is already in use.
    async fn create(&self, email: &str, password_hash: &str, name: &str) -> anyhow::Result<User>;
    /// Fails with [`EmailTaken`] if the new email belongs to someone else.
    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> anyhow::Result<Option<User>>;
    async fn set_image_key(&self, id: Uuid, key: &str) -> anyhow::Result<Option<User>>;
    /// Replaces the hash and bumps `token_version`.
    async fn set_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn bump_token_version(&self, id: Uuid) -> anyhow::Result<()>;
    async fn insert_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;
    /// Marks a live token used and returns its owner. Expired, used or
    /// unknown tokens yield `None`.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Uuid>>;
}

const USER_COLUMNS: &str =
    "id, email, name, image_key, role, password_hash, token_version, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, email: &str, password_hash: &str, name: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(DEFAULT_ROLE)
        .fetch_one(&self.db)
        .await
        .map_err(|e| email_write_error(e, "insert user"))?;
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.email.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| email_write_error(e, "update user profile"))?;
        Ok(user)
    }

    async fn set_image_key(&self, id: Uuid, key: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET image_key = $2, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .context("set user image key")?;
        Ok(user)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2,
                   token_version = token_version + 1,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await
        .context("set user password")?;
        Ok(())
    }

    async fn bump_token_version(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET token_version = token_version + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("bump token version")?;
        Ok(())
    }

    async fn insert_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("insert password reset")?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Uuid>> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE password_resets
               SET used_at = $2
             WHERE token_hash = $1
               AND used_at IS NULL
               AND expires_at > $2
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("consume password reset")?;
        Ok(row.map(|(id,)| id))
    }
}
