use std::str::FromStr;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::state::AppState;

/// Languages error messages are available in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl FromStr for Locale {
    type Err = ();

    /// Accepts bare tags and regional variants (`ja`, `ja-JP`, `en_US`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Ok(Locale::En),
            "ja" => Ok(Locale::Ja),
            _ => Err(()),
        }
    }
}

impl Locale {
    /// Picks the supported language with the highest `q` weight.
    pub fn from_accept_language(value: &str) -> Option<Locale> {
        let mut best: Option<(Locale, f32)> = None;
        for part in value.split(',') {
            let mut pieces = part.split(';');
            let tag = pieces.next().unwrap_or_default();
            let q = pieces
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            if q <= 0.0 {
                continue;
            }
            if let Ok(locale) = Locale::from_str(tag) {
                if best.map_or(true, |(_, best_q)| q > best_q) {
                    best = Some((locale, q));
                }
            }
        }
        best.map(|(locale, _)| locale)
    }

    pub fn from_headers(headers: &HeaderMap, fallback: Locale) -> Locale {
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .and_then(Locale::from_accept_language)
            .unwrap_or(fallback)
    }

    /// Locale of the request currently being handled.
    pub fn current() -> Locale {
        CURRENT_LOCALE.try_with(|l| *l).unwrap_or_default()
    }
}

tokio::task_local! {
    static CURRENT_LOCALE: Locale;
}

/// Runs the rest of the stack with the caller's locale in scope so error
/// responses can be rendered in it.
pub async fn scope_locale(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let locale = Locale::from_headers(req.headers(), state.config.default_locale);
    CURRENT_LOCALE.scope(locale, next.run(req)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regional_tags() {
        assert_eq!(Locale::from_str("ja-JP"), Ok(Locale::Ja));
        assert_eq!(Locale::from_str("en_GB"), Ok(Locale::En));
        assert!(Locale::from_str("fr").is_err());
    }

    #[test]
    fn accept_language_respects_weights() {
        assert_eq!(
            Locale::from_accept_language("fr-FR, en;q=0.5, ja;q=0.8"),
            Some(Locale::Ja)
        );
        assert_eq!(
            Locale::from_accept_language("ja;q=0, en"),
            Some(Locale::En)
        );
        assert_eq!(Locale::from_accept_language("de, fr"), None);
    }

    #[tokio::test]
    async fn current_defaults_outside_scope() {
        assert_eq!(Locale::current(), Locale::En);
        let inside = CURRENT_LOCALE.scope(Locale::Ja, async { Locale::current() }).await;
        assert_eq!(inside, Locale::Ja);
    }
}
