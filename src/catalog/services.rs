use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    dto::{CuisineResponse, DishResponse},
    repo::Dish,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    storage::image_url,
};

/// Cuisines shown on the home screen, with the image each one uses.
pub const CUISINES: [(&str, &str); 6] = [
    ("Chinese", "cuisines/chinese.png"),
    ("South Indian", "cuisines/south-indian.png"),
    ("Beverages", "cuisines/beverages.png"),
    ("North India", "cuisines/north-indian.png"),
    ("Pizza", "cuisines/pizza.png"),
    ("Rice", "cuisines/biryani.png"),
];

pub async fn dish_response(state: &AppState, dish: &Dish) -> DishResponse {
    DishResponse {
        id: dish.id,
        name: dish.name.clone(),
        description: dish.description.clone(),
        image_url: image_url(
            state.storage.as_ref(),
            dish.image_key.as_deref(),
            state.config.storage.url_ttl_seconds,
        )
        .await,
        price: dish.price,
        category: dish.category.clone(),
        available: dish.available,
        created_at: dish.created_at,
        updated_at: dish.updated_at,
    }
}

pub async fn list_cuisines(state: &AppState) -> Vec<CuisineResponse> {
    let ttl = state.config.storage.url_ttl_seconds;
    let mut out = Vec::with_capacity(CUISINES.len());
    for (name, key) in CUISINES {
        out.push(CuisineResponse {
            name,
            image_url: image_url(state.storage.as_ref(), Some(key), ttl).await,
        });
    }
    out
}

#[instrument(skip(state))]
pub async fn list_dishes(state: &AppState, category: Option<&str>) -> AppResult<Vec<DishResponse>> {
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("category is required".into()))?;

    let dishes = state.dishes.list_by_category(category).await?;
    debug!(%category, count = dishes.len(), "dishes listed");

    let mut out = Vec::with_capacity(dishes.len());
    for dish in &dishes {
        out.push(dish_response(state, dish).await);
    }
    Ok(out)
}

#[instrument(skip(state))]
pub async fn get_dish(state: &AppState, id: Uuid) -> AppResult<DishResponse> {
    let dish = state
        .dishes
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Dish not found".into()))?;
    Ok(dish_response(state, &dish).await)
}
