use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::extractors::AuthUser;
use crate::state::AppState;

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

/// Public part of the caller's identity.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        email: user.claims.email,
        role: user.claims.role,
    })
}
