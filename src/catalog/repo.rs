use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Catalog entry. Read-only from the API's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Dish {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_key: Option<String>,
    pub price: i64, // whole currency units
    pub category: String,
    pub available: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[async_trait]
pub trait DishRepo: Send + Sync {
    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<Dish>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Dish>>;
    /// Dishes for the given ids, in no particular order; unknown ids are skipped.
    async fn get_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Dish>>;
}

const DISH_COLUMNS: &str =
    "id, name, description, image_key, price, category, available, created_at, updated_at";

#[derive(Clone)]
pub struct PgDishRepo {
    db: PgPool,
}

impl PgDishRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DishRepo for PgDishRepo {
    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<Dish>> {
        let rows = sqlx::query_as::<_, Dish>(&format!(
            r#"
            SELECT {DISH_COLUMNS}
              FROM dishes
             WHERE category = $1
             ORDER BY name ASC
            "#
        ))
        .bind(category)
        .fetch_all(&self.db)
        .await
        .context("list dishes by category")?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Dish>> {
        let row = sqlx::query_as::<_, Dish>(&format!(
            "SELECT {DISH_COLUMNS} FROM dishes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get dish")?;
        Ok(row)
    }

    async fn get_many(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Dish>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Dish>(&format!(
            "SELECT {DISH_COLUMNS} FROM dishes WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("get dishes by ids")?;
        Ok(rows)
    }
}
