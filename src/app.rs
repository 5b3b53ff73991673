use std::{net::SocketAddr, time::Duration};

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use crate::{auth, foods, i18n, images, security};

pub fn build_app(state: AppState) -> Router {
    let max_image_bytes = state.config.storage.max_image_bytes;
    let cors = cors_layer(&state.config.allowed_origins);

    let api = Router::new()
        .merge(auth::router())
        .merge(foods::router())
        .merge(images::router(max_image_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security::origin::check_origin,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security::rate_limit::rate_limit,
        ));

    let router = Router::new()
        .nest(
            "/api/v1",
            api.route("/health", get(|| async { "ok" })),
        )
        .fallback(no_route)
        .layer(middleware::map_response(method_not_allowed_as_json))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            i18n::scope_locale,
        ))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis();
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        );

    security::headers::with_security_headers(router)
}

async fn no_route() -> ApiError {
    ApiError::NotFound
}

/// Gives the router's bare 405 the JSON error body, keeping its `Allow`.
async fn method_not_allowed_as_json(res: Response) -> Response {
    if res.status() != StatusCode::METHOD_NOT_ALLOWED {
        return res;
    }
    let allow = res.headers().get(header::ALLOW).cloned();
    let mut json = ApiError::MethodNotAllowed.into_response();
    if let Some(allow) = allow {
        json.headers_mut().insert(header::ALLOW, allow);
    }
    json
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT_LANGUAGE,
        ])
        .max_age(Duration::from_secs(600))
}

/// Periodically drops expired cache entries and elapsed rate-limit windows.
pub fn spawn_sweeper(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = state.cache.purge_expired();
            let stale = state.limiter.purge_stale();
            debug!(expired, stale, "sweep finished");
        }
    })
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
