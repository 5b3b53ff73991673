pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(max_image_bytes: usize) -> Router<AppState> {
    handlers::image_routes(max_image_bytes)
}
