use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{cart::pricing::Bill, catalog::repo::Dish};

/// Orders are created `pending` and nothing moves them on yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            other => anyhow::bail!("unknown order status {other:?}"),
        }
    }
}

/// One line of the order snapshot: the full dish as it was at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub dish: Dish,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub bill: Bill,
    pub status: OrderStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: Uuid,
    items: Json<Vec<OrderLine>>,
    subtotal: i64,
    discount: i64,
    tax: i64,
    delivery_fee: i64,
    total: i64,
    status: String,
    created_at: OffsetDateTime,
    updated_at: Option<OffsetDateTime>,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(r: OrderRow) -> anyhow::Result<Self> {
        Ok(Self {
            status: r.status.parse()?,
            id: r.id,
            user_id: r.user_id,
            items: r.items.0,
            bill: Bill {
                subtotal: r.subtotal,
                discount: r.discount,
                tax: r.tax,
                delivery_fee: r.delivery_fee,
                total: r.total,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Stores the order and deletes the owner's cart in one transaction.
    /// Returns `false`, writing nothing, if the cart is no longer at
    /// `cart_version`.
    async fn place(&self, order: &Order, cart_version: i64) -> anyhow::Result<bool>;
    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64)
        -> anyhow::Result<Vec<Order>>;
    async fn get(&self, user_id: Uuid, id: &str) -> anyhow::Result<Option<Order>>;
}

const ORDER_COLUMNS: &str = "id, user_id, items, subtotal, discount, tax, delivery_fee, total, \
                             status, created_at, updated_at";

#[derive(Clone)]
pub struct PgOrderRepo {
    db: PgPool,
}

impl PgOrderRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderRepo for PgOrderRepo {
    async fn place(&self, order: &Order, cart_version: i64) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let deleted = sqlx::query("DELETE FROM carts WHERE user_id = $1 AND version = $2")
            .bind(order.user_id)
            .bind(cart_version)
            .execute(&mut *tx)
            .await
            .context("delete cart")?;
        if deleted.rows_affected() == 0 {
            tx.rollback().await.context("rollback tx")?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, items, subtotal, discount, tax, delivery_fee,
                                total, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&order.id)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.bill.subtotal)
        .bind(order.bill.discount)
        .bind(order.bill.tax)
        .bind(order.bill.delivery_fee)
        .bind(order.bill.total)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .context("insert order")?;

        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
              FROM orders
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list orders by user")?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn get(&self, user_id: Uuid, id: &str) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get order")?;
        row.map(Order::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!(OrderStatus::Pending.as_str(), "pending");
        assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Pending).unwrap(), "\"pending\"");
    }
}
