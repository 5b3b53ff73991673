use time::Date;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    cache::ListKey,
    dto::{CalendarDay, CalendarMonth, DaySummary, FoodInput, FoodPatchInput, ImageInput, MealTotals},
    model::{FoodRecord, FoodRecordPatch, ImageChange, MealType, NewFoodRecord, YearMonth},
};
use crate::{
    error::ApiError,
    images::services::{delete_image_best_effort, public_url},
    state::AppState,
};

pub async fn create_food(
    st: &AppState,
    user_id: Uuid,
    input: FoodInput,
) -> Result<FoodRecord, ApiError> {
    let image_url = input
        .image_id
        .as_deref()
        .map(|id| public_url(&st.config.storage.public_base_url, user_id, id));
    let record = st
        .foods
        .insert(NewFoodRecord {
            user_id,
            meal_type: input.meal_type,
            food_name: input.food_name,
            weight: input.weight,
            calories: input.calories,
            image_url,
            image_id: input.image_id,
            record_date: input.record_date,
        })
        .await?;
    invalidate_user(st, user_id);
    info!(%user_id, food_id = %record.id, meal_type = %record.meal_type, "food record created");
    Ok(record)
}

/// Loads a record and checks the caller owns it.
pub async fn get_food(st: &AppState, user_id: Uuid, id: Uuid) -> Result<FoodRecord, ApiError> {
    let record = st.foods.find(id).await?.ok_or(ApiError::NotFound)?;
    if record.user_id != user_id {
        warn!(%user_id, food_id = %id, "access to another user's record denied");
        return Err(ApiError::Forbidden);
    }
    Ok(record)
}

pub async fn list_foods(
    st: &AppState,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> Result<Vec<FoodRecord>, ApiError> {
    let key = ListKey { user_id, from, to };
    if let Some(hit) = st.cache.get(&key) {
        debug!(%user_id, "food list served from cache");
        return Ok(hit);
    }
    let generation = st.cache.generation(user_id);
    let records = st.foods.list_range(user_id, from, to).await?;
    if !st.cache.insert_if_current(key, records.clone(), generation) {
        debug!(%user_id, "food list changed while loading; not cached");
    }
    Ok(records)
}

pub async fn update_food(
    st: &AppState,
    user_id: Uuid,
    id: Uuid,
    input: FoodPatchInput,
) -> Result<FoodRecord, ApiError> {
    let existing = get_food(st, user_id, id).await?;

    let image = match input.image {
        ImageInput::Keep => ImageChange::Keep,
        ImageInput::Set(image_id) => ImageChange::Set {
            image_url: public_url(&st.config.storage.public_base_url, user_id, &image_id),
            image_id,
        },
        ImageInput::Remove => ImageChange::Remove,
    };
    let patch = FoodRecordPatch {
        meal_type: input.meal_type,
        food_name: input.food_name,
        weight: input.weight,
        calories: input.calories,
        record_date: input.record_date,
        image,
    };

    let updated = st
        .foods
        .update(id, &patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    invalidate_user(st, user_id);

    if let Some(old) = existing.image_id.as_deref() {
        if updated.image_id.as_deref() != Some(old) {
            release_image(st, user_id, old).await;
        }
    }

    info!(%user_id, food_id = %id, "food record updated");
    Ok(updated)
}

pub async fn delete_food(st: &AppState, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
    let existing = get_food(st, user_id, id).await?;
    if !st.foods.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    invalidate_user(st, user_id);

    if let Some(image_id) = existing.image_id.as_deref() {
        release_image(st, user_id, image_id).await;
    }
    info!(%user_id, food_id = %id, "food record deleted");
    Ok(())
}

pub async fn day_summary(st: &AppState, user_id: Uuid, date: Date) -> Result<DaySummary, ApiError> {
    let records = list_foods(st, user_id, date, date).await?;
    Ok(summarize_day(date, &records))
}

pub async fn month_calendar(
    st: &AppState,
    user_id: Uuid,
    month: YearMonth,
) -> Result<CalendarMonth, ApiError> {
    let records = list_foods(st, user_id, month.first_day(), month.last_day()).await?;
    Ok(CalendarMonth {
        month: month.to_string(),
        days: calendar_days(&records),
    })
}

fn invalidate_user(st: &AppState, user_id: Uuid) {
    let dropped = st.cache.invalidate_user(user_id);
    if dropped > 0 {
        debug!(%user_id, dropped, "food list cache invalidated");
    }
}

/// Deletes an image a record stopped pointing at, unless another of the
/// user's records still uses it.
async fn release_image(st: &AppState, user_id: Uuid, image_id: &str) {
    match st.foods.image_references(user_id, image_id).await {
        Ok(0) => delete_image_best_effort(st, user_id, image_id).await,
        Ok(refs) => debug!(%user_id, %image_id, refs, "image still referenced; kept"),
        Err(e) => warn!(error = ?e, %user_id, %image_id, "could not count image references; kept"),
    }
}

/// Totals per meal type (every type present, zeros included) and for the day.
pub fn summarize_day(date: Date, records: &[FoodRecord]) -> DaySummary {
    let meals: Vec<MealTotals> = MealType::ALL
        .into_iter()
        .map(|meal_type| {
            let of_type = records.iter().filter(|r| r.meal_type == meal_type);
            MealTotals {
                meal_type,
                entries: of_type.clone().count(),
                calories: of_type.clone().map(|r| i64::from(r.calories)).sum(),
                weight: of_type.map(|r| r.weight).sum(),
            }
        })
        .collect();
    DaySummary {
        date,
        total_entries: meals.iter().map(|m| m.entries).sum(),
        total_calories: meals.iter().map(|m| m.calories).sum(),
        total_weight: meals.iter().map(|m| m.weight).sum(),
        meals,
    }
}

/// One entry per day that has records; expects `records` in listing order.
pub fn calendar_days(records: &[FoodRecord]) -> Vec<CalendarDay> {
    let mut days: Vec<CalendarDay> = Vec::new();
    for r in records {
        match days.last_mut() {
            Some(day) if day.date == r.record_date => {
                day.entries += 1;
                day.total_calories += i64::from(r.calories);
            }
            _ => days.push(CalendarDay {
                date: r.record_date,
                entries: 1,
                total_calories: i64::from(r.calories),
            }),
        }
    }
    days
}
