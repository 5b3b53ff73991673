use crate::state::AppState;
use axum::Router;

mod claims;
mod extractors;
pub mod handlers;
pub mod jwt;

pub use extractors::AuthUser;
pub use jwt::JwtKeys;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::me_routes())
}
