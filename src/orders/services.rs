use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{OrderLineResponse, OrderResponse, Pagination, PaymentReceipt},
    repo::{Order, OrderLine, OrderStatus},
};
use crate::{
    cart::{pricing::Bill, services::load_joined},
    catalog::services::dish_response,
    error::{AppError, AppResult},
    state::AppState,
};

/// `{user_id}_{unix_millis}`
pub fn order_id(user_id: Uuid, at: OffsetDateTime) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("{user_id}_{millis}")
}

async fn order_response(state: &AppState, order: &Order) -> OrderResponse {
    let mut items = Vec::with_capacity(order.items.len());
    for line in &order.items {
        items.push(OrderLineResponse {
            dish: dish_response(state, &line.dish).await,
            quantity: line.quantity,
            line_total: line.dish.price.saturating_mul(line.quantity),
        });
    }
    OrderResponse {
        id: order.id.clone(),
        user_id: order.user_id,
        items,
        bill: order.bill,
        status: order.status,
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}

/// Bills the current cart, stores the order and removes the cart.
#[instrument(skip(state))]
pub async fn checkout(state: &AppState, user_id: Uuid) -> AppResult<PaymentReceipt> {
    let joined = load_joined(state, user_id).await?;
    if joined.lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let bill = Bill::compute(joined.subtotal(), &state.config.pricing);
    let now = OffsetDateTime::now_utc();
    let order = Order {
        id: order_id(user_id, now),
        user_id,
        items: joined
            .lines
            .iter()
            .map(|l| OrderLine {
                dish: l.dish.clone(),
                quantity: l.quantity,
            })
            .collect(),
        bill,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: None,
    };

    if !state.orders.place(&order, joined.version).await? {
        warn!(%user_id, version = joined.version, "cart changed during checkout");
        return Err(AppError::Conflict(
            "Cart was changed during checkout, please review it".into(),
        ));
    }
    info!(%user_id, order_id = %order.id, total = bill.total, "order placed");

    Ok(PaymentReceipt {
        order_id: order.id.clone(),
        total_pay: bill.total,
        order: order_response(state, &order).await,
    })
}

#[instrument(skip(state))]
pub async fn list_orders(
    state: &AppState,
    user_id: Uuid,
    page: &Pagination,
) -> AppResult<Vec<OrderResponse>> {
    let (limit, offset) = page.clamped();
    let orders = state.orders.list_by_user(user_id, limit, offset).await?;
    let mut out = Vec::with_capacity(orders.len());
    for order in &orders {
        out.push(order_response(state, order).await);
    }
    Ok(out)
}

#[instrument(skip(state))]
pub async fn get_order(state: &AppState, user_id: Uuid, id: &str) -> AppResult<OrderResponse> {
    let order = state
        .orders
        .get(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(order_response(state, &order).await)
}
