use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::Locale;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Rejected input. Each variant has a message per supported locale.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("food_name must not be empty")]
    EmptyFoodName,
    #[error("food_name must be at most {max} characters")]
    FoodNameTooLong { max: usize },
    #[error("{field} contains disallowed content")]
    UnsafeInput { field: &'static str },
    #[error("weight must be greater than 0 and at most {max}")]
    InvalidWeight { max: u32 },
    #[error("calories must be between 0 and {max}")]
    InvalidCalories { max: i32 },
    #[error("unknown meal_type: {0}")]
    InvalidMealType(String),
    #[error("invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error("invalid month (expected YYYY-MM): {0}")]
    InvalidMonth(String),
    #[error("date range must satisfy from <= to and span at most {max_days} days")]
    InvalidRange { max_days: i64 },
    #[error("no fields to update")]
    EmptyPatch,
    #[error("invalid image id")]
    InvalidImageId,
    #[error("unsupported image type: {0}")]
    UnsupportedImageType(String),
    #[error("image content does not match its declared type")]
    ImageContentMismatch,
    #[error("multipart field `file` is required")]
    MissingFile,
}

impl ValidationError {
    pub fn message(&self, locale: Locale) -> String {
        match locale {
            Locale::En => self.to_string(),
            Locale::Ja => match self {
                ValidationError::Malformed(detail) => format!("リクエストの形式が正しくありません: {detail}"),
                ValidationError::EmptyFoodName => "食品名を入力してください".into(),
                ValidationError::FoodNameTooLong { max } => {
                    format!("食品名は{max}文字以内で入力してください")
                }
                ValidationError::UnsafeInput { field } => {
                    format!("{field} に使用できない文字列が含まれています")
                }
                ValidationError::InvalidWeight { max } => {
                    format!("重量は0より大きく{max}以下で入力してください")
                }
                ValidationError::InvalidCalories { max } => {
                    format!("カロリーは0以上{max}以下で入力してください")
                }
                ValidationError::InvalidMealType(v) => format!("食事の種類が不正です: {v}"),
                ValidationError::InvalidDate(v) => format!("日付の形式が不正です (YYYY-MM-DD): {v}"),
                ValidationError::InvalidMonth(v) => format!("月の形式が不正です (YYYY-MM): {v}"),
                ValidationError::InvalidRange { max_days } => {
                    format!("期間は開始日 <= 終了日 かつ {max_days} 日以内で指定してください")
                }
                ValidationError::EmptyPatch => "更新する項目がありません".into(),
                ValidationError::InvalidImageId => "画像IDが不正です".into(),
                ValidationError::UnsupportedImageType(v) => {
                    format!("対応していない画像形式です: {v}")
                }
                ValidationError::ImageContentMismatch => {
                    "画像の内容が指定された形式と一致しません".into()
                }
                ValidationError::MissingFile => "ファイルを指定してください".into(),
            },
        }
    }
}

/// Error type returned by every handler and middleware.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("missing or malformed Authorization header")]
    Unauthorized,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("request origin is not allowed")]
    ForbiddenOrigin,
    #[error("record belongs to another user")]
    Forbidden,
    #[error("record not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("image is still attached to a food record")]
    ImageInUse,
    #[error("payload exceeds {max} bytes")]
    PayloadTooLarge { max: usize },
    #[error("rate limit exceeded, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenOrigin | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ImageInUse => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::ForbiddenOrigin => "FORBIDDEN_ORIGIN",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::ImageInUse => "IMAGE_IN_USE",
            ApiError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// User-facing message. Internal errors never leak their detail.
    pub fn message(&self, locale: Locale) -> String {
        match (self, locale) {
            (ApiError::Validation(v), _) => v.message(locale),
            (ApiError::Internal(_), Locale::En) => "An unexpected error occurred".into(),
            (ApiError::Internal(_), Locale::Ja) => "予期しないエラーが発生しました".into(),
            (_, Locale::En) => self.to_string(),
            (ApiError::Unauthorized, Locale::Ja) => "認証が必要です".into(),
            (ApiError::InvalidToken, Locale::Ja) => {
                "トークンが無効か有効期限が切れています".into()
            }
            (ApiError::ForbiddenOrigin, Locale::Ja) => "許可されていないオリジンです".into(),
            (ApiError::Forbidden, Locale::Ja) => "この記録を操作する権限がありません".into(),
            (ApiError::NotFound, Locale::Ja) => "記録が見つかりません".into(),
            (ApiError::MethodNotAllowed, Locale::Ja) => "許可されていないメソッドです".into(),
            (ApiError::ImageInUse, Locale::Ja) => "この画像は食事記録で使用中です".into(),
            (ApiError::PayloadTooLarge { max }, Locale::Ja) => {
                format!("ファイルサイズは{max}バイト以下にしてください")
            }
            (ApiError::RateLimited { retry_after }, Locale::Ja) => {
                format!("リクエストが多すぎます。{retry_after}秒後に再試行してください")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            tracing::error!(error = ?e, "internal error");
        }
        let status = self.status();
        let body = ErrorBody {
            code: self.code(),
            message: self.message(Locale::current()),
        };
        match self {
            ApiError::RateLimited { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(body),
            )
                .into_response(),
            _ => (status, Json(body)).into_response(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(ValidationError::Malformed(e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::Validation(ValidationError::Malformed(e.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::Validation(ValidationError::Malformed(e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            ApiError::from(ValidationError::EmptyPatch).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::ImageInUse.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::RateLimited { retry_after: 3 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = ApiError::Internal(anyhow::anyhow!("password=hunter2"));
        assert!(!err.message(Locale::En).contains("hunter2"));
        assert!(!err.message(Locale::Ja).contains("hunter2"));
    }

    #[test]
    fn messages_are_localized() {
        let err = ApiError::NotFound;
        assert_eq!(err.message(Locale::En), "record not found");
        assert_eq!(err.message(Locale::Ja), "記録が見つかりません");

        let v = ValidationError::FoodNameTooLong { max: 100 };
        assert!(v.message(Locale::Ja).contains("100"));
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let res = ApiError::RateLimited { retry_after: 12 }.into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "12");
    }
}
