pub mod dto;
mod handlers;
pub mod model;
pub mod pricing;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::cart_routes()
}
