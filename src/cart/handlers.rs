use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        AddItemRequest, CartCount, CartView, ChangeQuantityRequest, ReplaceCartRequest,
        VersionQuery,
    },
    services,
};
use crate::{auth::AuthUser, error::AppResult, state::AppState};

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).put(replace_cart).delete(clear_cart))
        .route("/cart/count", get(cart_count))
        .route("/cart/items", post(add_item))
        .route(
            "/cart/items/:dish_id",
            patch(change_quantity).delete(remove_item),
        )
}

#[instrument(skip(state))]
pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<CartView>> {
    Ok(Json(services::view(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn cart_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<CartCount>> {
    let count = services::count(&state, user_id).await?;
    Ok(Json(CartCount { count }))
}

#[instrument(skip(state))]
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AddItemRequest>,
) -> AppResult<Json<CartView>> {
    Ok(Json(services::add_item(&state, user_id, body.dish_id).await?))
}

#[instrument(skip(state))]
pub async fn change_quantity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(dish_id): Path<Uuid>,
    Json(body): Json<ChangeQuantityRequest>,
) -> AppResult<Json<CartView>> {
    let view =
        services::change_quantity(&state, user_id, dish_id, body.delta, body.version).await?;
    Ok(Json(view))
}

/// DELETE /cart/items/:dish_id?version=N
#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(dish_id): Path<Uuid>,
    Query(q): Query<VersionQuery>,
) -> AppResult<Json<CartView>> {
    Ok(Json(services::remove_item(&state, user_id, dish_id, q.version).await?))
}

#[instrument(skip(state, body))]
pub async fn replace_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<ReplaceCartRequest>,
) -> AppResult<Json<CartView>> {
    Ok(Json(services::replace(&state, user_id, body.items, body.version).await?))
}

#[instrument(skip(state))]
pub async fn clear_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<StatusCode> {
    services::clear(&state, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
