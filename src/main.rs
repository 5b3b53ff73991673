use std::{sync::Arc, time::Duration};

mod app;
mod auth;
mod cache;
mod config;
mod db;
mod error;
mod extract;
mod foods;
mod i18n;
mod images;
mod security;
mod state;
mod storage;

use crate::{
    config::AppConfig,
    foods::PgFoodStore,
    state::AppState,
    storage::{S3Storage, StorageClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "food_diary=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);

    let pool = db::connect(&config.database_url).await?;
    db::migrate(&pool).await;

    let storage = Arc::new(S3Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
    let state = AppState::from_parts(config, Arc::new(PgFoodStore::new(pool)), storage);

    app::spawn_sweeper(state.clone(), Duration::from_secs(60));
    app::serve(app::build_app(state)).await
}
