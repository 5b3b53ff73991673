use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use time::{Date, OffsetDateTime};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        CalendarMonth, CalendarQuery, CreateFoodRequest, DaySummary, ListQuery, PatchFoodRequest,
        SummaryQuery,
    },
    model::{parse_date, FoodRecord},
    services,
};
use crate::{
    auth::AuthUser,
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

pub fn food_routes() -> Router<AppState> {
    Router::new()
        .route("/foods", get(list_foods).post(create_food))
        .route("/foods/summary", get(day_summary))
        .route("/foods/calendar", get(month_calendar))
        .route(
            "/foods/:id",
            get(get_food).patch(update_food).delete(delete_food),
        )
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// GET /foods?date=YYYY-MM-DD | ?from=..&to=..
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_foods(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> Result<Json<Vec<FoodRecord>>, ApiError> {
    let (from, to) = q.range(today())?;
    let records = services::list_foods(&state, user.id, from, to).await?;
    Ok(Json(records))
}

/// POST /foods
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_food(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateFoodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = body.validate(today())?;
    let record = services::create_food(&state, user.id, input).await?;
    let location = format!("/api/v1/foods/{}", record.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(record),
    ))
}

/// GET /foods/:id
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_food(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<FoodRecord>, ApiError> {
    Ok(Json(services::get_food(&state, user.id, id).await?))
}

/// PATCH /foods/:id
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_food(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PatchFoodRequest>,
) -> Result<Json<FoodRecord>, ApiError> {
    let patch = body.validate()?;
    Ok(Json(services::update_food(&state, user.id, id, patch).await?))
}

/// DELETE /foods/:id
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_food(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::delete_food(&state, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /foods/summary?date=YYYY-MM-DD
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn day_summary(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(q): ApiQuery<SummaryQuery>,
) -> Result<Json<DaySummary>, ApiError> {
    let date = match q.date.as_deref() {
        Some(d) => parse_date(d)?,
        None => today(),
    };
    Ok(Json(services::day_summary(&state, user.id, date).await?))
}

/// GET /foods/calendar?month=YYYY-MM
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn month_calendar(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(q): ApiQuery<CalendarQuery>,
) -> Result<Json<CalendarMonth>, ApiError> {
    let month = q.month(today())?;
    Ok(Json(services::month_calendar(&state, user.id, month).await?))
}
