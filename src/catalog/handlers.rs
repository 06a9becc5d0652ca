use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CuisineResponse, DishQuery, DishResponse},
    services,
};
use crate::{error::AppResult, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/cuisines", get(list_cuisines))
        .route("/dishes", get(list_dishes))
        .route("/dishes/:id", get(get_dish))
}

#[instrument(skip(state))]
pub async fn list_cuisines(State(state): State<AppState>) -> Json<Vec<CuisineResponse>> {
    Json(services::list_cuisines(&state).await)
}

/// GET /dishes?category=Chinese
#[instrument(skip(state))]
pub async fn list_dishes(
    State(state): State<AppState>,
    Query(q): Query<DishQuery>,
) -> AppResult<Json<Vec<DishResponse>>> {
    Ok(Json(services::list_dishes(&state, q.category.as_deref()).await?))
}

#[instrument(skip(state))]
pub async fn get_dish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DishResponse>> {
    Ok(Json(services::get_dish(&state, id).await?))
}
