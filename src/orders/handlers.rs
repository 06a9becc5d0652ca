use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{OrderResponse, Pagination, PaymentReceipt},
    services,
};
use crate::{auth::AuthUser, error::AppResult, state::AppState};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/cart/checkout", post(checkout))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
}

#[instrument(skip(state))]
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<(StatusCode, Json<PaymentReceipt>)> {
    let receipt = services::checkout(&state, user_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<OrderResponse>>> {
    Ok(Json(services::list_orders(&state, user_id, &page).await?))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<OrderResponse>> {
    Ok(Json(services::get_order(&state, user_id, &id).await?))
}
