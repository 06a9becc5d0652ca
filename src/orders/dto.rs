use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::OrderStatus;
use crate::{cart::pricing::Bill, catalog::dto::DishResponse};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Limit in `1..=MAX_PAGE_SIZE`, offset never negative.
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_PAGE_SIZE), self.offset.max(0))
    }
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub dish: DishResponse,
    pub quantity: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: Uuid,
    pub items: Vec<OrderLineResponse>,
    pub bill: Bill,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Returned by checkout.
#[derive(Debug, Serialize)]
pub struct PaymentReceipt {
    pub order_id: String,
    pub total_pay: i64,
    pub order: OrderResponse,
}
