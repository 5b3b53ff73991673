use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::i18n::Locale;

/// Settings for verifying bearer tokens issued by the hosted auth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub audience: String,
    pub issuer: Option<String>,
}

/// S3-compatible image host.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_base_url: String,
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub allowed_origins: Vec<String>,
    pub default_locale: Locale,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".into()),
            issuer: std::env::var("JWT_ISSUER").ok().filter(|v| !v.is_empty()),
        };

        let endpoint = std::env::var("S3_ENDPOINT").context("S3_ENDPOINT is not set")?;
        let bucket = std::env::var("S3_BUCKET").context("S3_BUCKET is not set")?;
        let public_base_url = std::env::var("IMAGE_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let storage = StorageConfig {
            access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY is not set")?,
            secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY is not set")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_image_bytes: env_or("MAX_IMAGE_BYTES", 5 * 1024 * 1024),
            endpoint,
            bucket,
        };

        let rate_limit = RateLimitConfig {
            max_requests: env_or("RATE_LIMIT_MAX", 100),
            window_secs: env_or("RATE_LIMIT_WINDOW_SECS", 60),
        };

        let cache = CacheConfig {
            ttl_secs: env_or("CACHE_TTL_SECS", 60),
            max_entries: env_or("CACHE_MAX_ENTRIES", 10_000),
        };

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_else(|_| vec!["http://localhost:3000".into()]);

        let default_locale = std::env::var("DEFAULT_LOCALE")
            .ok()
            .and_then(|v| Locale::from_str(&v).ok())
            .unwrap_or_default();

        Ok(Self {
            database_url,
            jwt,
            storage,
            rate_limit,
            cache,
            allowed_origins,
            default_locale,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Splits a comma separated origin list, dropping blanks and trailing slashes.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_trims_and_skips_empty() {
        let origins = parse_origins(" https://a.example/ ,, http://localhost:3000 ");
        assert_eq!(origins, vec!["https://a.example", "http://localhost:3000"]);
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("FOOD_DIARY_TEST_NUM", "not-a-number");
        assert_eq!(env_or::<u32>("FOOD_DIARY_TEST_NUM", 7), 7);
        std::env::set_var("FOOD_DIARY_TEST_NUM", "42");
        assert_eq!(env_or::<u32>("FOOD_DIARY_TEST_NUM", 7), 42);
    }
}
