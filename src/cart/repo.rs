use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::LineItem;

/// Per-user cart document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    pub version: i64,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct CartRow {
    user_id: Uuid,
    items: Json<Vec<LineItem>>,
    version: i64,
    updated_at: OffsetDateTime,
}

impl From<CartRow> for Cart {
    fn from(r: CartRow) -> Self {
        Self {
            user_id: r.user_id,
            items: r.items.0,
            version: r.version,
            updated_at: r.updated_at,
        }
    }
}

/// How a cart write relates to what the caller last read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Overwrite whatever is stored (last write wins).
    Any,
    /// The cart must not exist yet.
    Absent,
    /// The stored cart must still be at this version.
    Version(i64),
}

impl Expect {
    /// `Version(0)` is how an absent cart reads, so treat it as `Absent`.
    pub fn from_read(version: Option<i64>) -> Self {
        match version {
            None => Expect::Any,
            Some(0) => Expect::Absent,
            Some(v) => Expect::Version(v),
        }
    }
}

#[async_trait]
pub trait CartRepo: Send + Sync {
    async fn get(&self, user_id: Uuid) -> anyhow::Result<Option<Cart>>;
    /// Replaces the whole item list in one write and bumps the version.
    /// `None` means the expectation did not hold and nothing was written.
    async fn save(
        &self,
        user_id: Uuid,
        items: &[LineItem],
        expect: Expect,
    ) -> anyhow::Result<Option<Cart>>;
    async fn delete(&self, user_id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgCartRepo {
    db: PgPool,
}

impl PgCartRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CartRepo for PgCartRepo {
    async fn get(&self, user_id: Uuid) -> anyhow::Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT user_id, items, version, updated_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get cart")?;
        Ok(row.map(Cart::from))
    }

    async fn save(
        &self,
        user_id: Uuid,
        items: &[LineItem],
        expect: Expect,
    ) -> anyhow::Result<Option<Cart>> {
        let items = Json(items.to_vec());
        let row = match expect {
            Expect::Any => sqlx::query_as::<_, CartRow>(
                r#"
                INSERT INTO carts (user_id, items, version, updated_at)
                VALUES ($1, $2, 1, now())
                ON CONFLICT (user_id) DO UPDATE
                   SET items = EXCLUDED.items,
                       version = carts.version + 1,
                       updated_at = now()
                RETURNING user_id, items, version, updated_at
                "#,
            )
            .bind(user_id)
            .bind(items)
            .fetch_optional(&self.db)
            .await,
            Expect::Absent => sqlx::query_as::<_, CartRow>(
                r#"
                INSERT INTO carts (user_id, items, version, updated_at)
                VALUES ($1, $2, 1, now())
                ON CONFLICT (user_id) DO NOTHING
                RETURNING user_id, items, version, updated_at
                "#,
            )
            .bind(user_id)
            .bind(items)
            .fetch_optional(&self.db)
            .await,
            Expect::Version(v) => sqlx::query_as::<_, CartRow>(
                r#"
                UPDATE carts
                   SET items = $2, version = version + 1, updated_at = now()
                 WHERE user_id = $1 AND version = $3
                RETURNING user_id, items, version, updated_at
                "#,
            )
            .bind(user_id)
            .bind(items)
            .bind(v)
            .fetch_optional(&self.db)
            .await,
        }
        .context("save cart")?;
        Ok(row.map(Cart::from))
    }

    async fn delete(&self, user_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete cart")?;
        Ok(res.rows_affected() > 0)
    }
}
