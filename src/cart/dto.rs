use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{model::LineItem, pricing::Bill};
use crate::catalog::dto::DishResponse;

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub dish: DishResponse,
    pub quantity: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineResponse>,
    pub bill: Bill,
    pub item_count: i64,
    /// 0 when no cart document exists yet.
    pub version: i64,
    pub checkout_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub dish_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ChangeQuantityRequest {
    pub delta: i64,
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceCartRequest {
    pub items: Vec<LineItem>,
    pub version: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub version: Option<i64>,
}
