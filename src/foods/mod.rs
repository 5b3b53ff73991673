pub mod cache;
pub mod dto;
pub mod handlers;
pub mod model;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use model::FoodRecord;
pub use repo::{FoodStore, PgFoodStore};
pub use cache::{FoodListCache, ListKey};

pub fn router() -> Router<AppState> {
    handlers::food_routes()
}
