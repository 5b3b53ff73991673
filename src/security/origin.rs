use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{error::ApiError, state::AppState};

/// Rejects state-changing browser requests from origins not on the allow-list.
/// Requests without an `Origin` header (non-browser clients) pass through.
pub async fn check_origin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_state_changing(req.method()) {
        if let Some(origin) = req.headers().get(header::ORIGIN) {
            let origin = origin.to_str().unwrap_or_default();
            if !is_allowed_origin(origin, &state.config.allowed_origins) {
                warn!(%origin, method = %req.method(), "blocked cross-origin request");
                return Err(ApiError::ForbiddenOrigin);
            }
        }
    }
    Ok(next.run(req).await)
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

pub fn is_allowed_origin(origin: &str, allowed: &[String]) -> bool {
    let origin = origin.trim_end_matches('/');
    !origin.is_empty() && allowed.iter().any(|a| a.eq_ignore_ascii_case(origin))
}
