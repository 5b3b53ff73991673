use serde::{Deserialize, Serialize};
use time::Date;

use super::model::{parse_date, serialize_date, MealType, YearMonth};
use crate::{
    error::ValidationError,
    images::services::validate_image_id,
    security::sanitize::{looks_like_sql_injection, sanitize_text},
};

pub const MAX_FOOD_NAME_CHARS: usize = 100;
pub const MAX_WEIGHT_GRAMS: u32 = 10_000;
pub const MAX_CALORIES: i32 = 10_000;
pub const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFoodRequest {
    pub meal_type: String,
    pub food_name: String,
    pub weight: f64,
    pub calories: i32,
    pub record_date: Option<String>,
    pub image_id: Option<String>,
}

/// Create input after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodInput {
    pub meal_type: MealType,
    pub food_name: String,
    pub weight: f64,
    pub calories: i32,
    pub record_date: Date,
    pub image_id: Option<String>,
}

impl CreateFoodRequest {
    pub fn validate(self, today: Date) -> Result<FoodInput, ValidationError> {
        Ok(FoodInput {
            meal_type: self.meal_type.parse::<MealType>()?,
            food_name: validate_food_name(&self.food_name)?,
            weight: validate_weight(self.weight)?,
            calories: validate_calories(self.calories)?,
            record_date: match self.record_date.as_deref() {
                Some(d) => parse_date(d)?,
                None => today,
            },
            image_id: match self.image_id {
                Some(id) => {
                    validate_image_id(&id)?;
                    Some(id)
                }
                None => None,
            },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchFoodRequest {
    pub meal_type: Option<String>,
    pub food_name: Option<String>,
    pub weight: Option<f64>,
    pub calories: Option<i32>,
    pub record_date: Option<String>,
    pub image_id: Option<String>,
    #[serde(default)]
    pub remove_image: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ImageInput {
    #[default]
    Keep,
    Set(String),
    Remove,
}

/// Patch input after validation; at least one field is present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FoodPatchInput {
    pub meal_type: Option<MealType>,
    pub food_name: Option<String>,
    pub weight: Option<f64>,
    pub calories: Option<i32>,
    pub record_date: Option<Date>,
    pub image: ImageInput,
}

impl PatchFoodRequest {
    pub fn validate(self) -> Result<FoodPatchInput, ValidationError> {
        let image = match (self.image_id, self.remove_image) {
            (Some(_), true) => {
                return Err(ValidationError::Malformed(
                    "image_id and remove_image cannot be combined".into(),
                ))
            }
            (Some(id), false) => {
                validate_image_id(&id)?;
                ImageInput::Set(id)
            }
            (None, true) => ImageInput::Remove,
            (None, false) => ImageInput::Keep,
        };

        let patch = FoodPatchInput {
            meal_type: self.meal_type.as_deref().map(str::parse::<MealType>).transpose()?,
            food_name: self.food_name.as_deref().map(validate_food_name).transpose()?,
            weight: self.weight.map(validate_weight).transpose()?,
            calories: self.calories.map(validate_calories).transpose()?,
            record_date: self.record_date.as_deref().map(parse_date).transpose()?,
            image,
        };
        if patch == FoodPatchInput::default() {
            return Err(ValidationError::EmptyPatch);
        }
        Ok(patch)
    }
}

/// Sanitizes a food name and checks it is non-empty and short enough.
pub fn validate_food_name(raw: &str) -> Result<String, ValidationError> {
    if looks_like_sql_injection(raw) {
        return Err(ValidationError::UnsafeInput { field: "food_name" });
    }
    let name = sanitize_text(raw);
    if name.is_empty() {
        return Err(ValidationError::EmptyFoodName);
    }
    if name.chars().count() > MAX_FOOD_NAME_CHARS {
        return Err(ValidationError::FoodNameTooLong {
            max: MAX_FOOD_NAME_CHARS,
        });
    }
    Ok(name)
}

fn validate_weight(weight: f64) -> Result<f64, ValidationError> {
    if weight.is_finite() && weight > 0.0 && weight <= f64::from(MAX_WEIGHT_GRAMS) {
        Ok(weight)
    } else {
        Err(ValidationError::InvalidWeight {
            max: MAX_WEIGHT_GRAMS,
        })
    }
}

fn validate_calories(calories: i32) -> Result<i32, ValidationError> {
    if (0..=MAX_CALORIES).contains(&calories) {
        Ok(calories)
    } else {
        Err(ValidationError::InvalidCalories { max: MAX_CALORIES })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ListQuery {
    /// Resolves to an inclusive date range; defaults to `today`.
    pub fn range(&self, today: Date) -> Result<(Date, Date), ValidationError> {
        let invalid = ValidationError::InvalidRange {
            max_days: MAX_RANGE_DAYS,
        };
        match (&self.date, &self.from, &self.to) {
            (Some(d), None, None) => {
                let d = parse_date(d)?;
                Ok((d, d))
            }
            (None, Some(from), Some(to)) => {
                let (from, to) = (parse_date(from)?, parse_date(to)?);
                let span = (to - from).whole_days() + 1;
                if span < 1 || span > MAX_RANGE_DAYS {
                    return Err(invalid);
                }
                Ok((from, to))
            }
            (None, None, None) => Ok((today, today)),
            _ => Err(invalid),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub month: Option<String>,
}

impl CalendarQuery {
    pub fn month(&self, today: Date) -> Result<YearMonth, ValidationError> {
        match &self.month {
            Some(m) => m.parse(),
            None => Ok(YearMonth::of(today)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealTotals {
    pub meal_type: MealType,
    pub entries: usize,
    pub calories: i64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    pub meals: Vec<MealTotals>,
    pub total_entries: usize,
    pub total_calories: i64,
    pub total_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    pub entries: usize,
    pub total_calories: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarMonth {
    pub month: String,
    pub days: Vec<CalendarDay>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use uuid::Uuid;

    fn create(name: &str) -> CreateFoodRequest {
        CreateFoodRequest {
            meal_type: "lunch".into(),
            food_name: name.into(),
            weight: 250.0,
            calories: 480,
            record_date: None,
            image_id: None,
        }
    }

    #[test]
    fn create_defaults_date_and_sanitizes_name() {
        let today = date!(2026 - 10 - 18);
        let input = create("  <i>Katsu</i> curry ").validate(today).unwrap();
        assert_eq!(input.food_name, "Katsu curry");
        assert_eq!(input.record_date, today);
        assert_eq!(input.meal_type, MealType::Lunch);
    }

    #[test]
    fn create_rejects_out_of_range_numbers() {
        let today = date!(2026 - 10 - 18);
        let mut req = create("Rice");
        req.weight = 0.0;
        assert!(matches!(req.validate(today), Err(ValidationError::InvalidWeight { .. })));

        let mut req = create("Rice");
        req.weight = f64::NAN;
        assert!(matches!(req.validate(today), Err(ValidationError::InvalidWeight { .. })));

        let mut req = create("Rice");
        req.calories = -1;
        assert!(matches!(req.validate(today), Err(ValidationError::InvalidCalories { .. })));

        let mut req = create("Rice");
        req.calories = MAX_CALORIES + 1;
        assert!(matches!(req.validate(today), Err(ValidationError::InvalidCalories { .. })));
    }

    #[test]
    fn create_rejects_bad_names() {
        let today = date!(2026 - 10 - 18);
        assert_eq!(
            create("<br/>").validate(today),
            Err(ValidationError::EmptyFoodName)
        );
        assert_eq!(
            create(&"a".repeat(MAX_FOOD_NAME_CHARS + 1)).validate(today),
            Err(ValidationError::FoodNameTooLong { max: MAX_FOOD_NAME_CHARS })
        );
        assert_eq!(
            create("x' OR '1'='1").validate(today),
            Err(ValidationError::UnsafeInput { field: "food_name" })
        );
        // multibyte names are measured in characters
        assert!(create(&"寿".repeat(MAX_FOOD_NAME_CHARS)).validate(today).is_ok());
    }

    #[test]
    fn create_checks_image_id() {
        let today = date!(2026 - 10 - 18);
        let mut req = create("Toast");
        req.image_id = Some("../../etc/passwd".into());
        assert_eq!(req.validate(today), Err(ValidationError::InvalidImageId));

        let mut req = create("Toast");
        let id = format!("{}.png", Uuid::new_v4());
        req.image_id = Some(id.clone());
        assert_eq!(req.validate(today).unwrap().image_id, Some(id));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: Result<CreateFoodRequest, _> = serde_json::from_str(
            r#"{"meal_type":"snack","food_name":"Nuts","weight":30,"calories":180,"user_id":"x"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn patch_requires_a_field() {
        assert_eq!(
            PatchFoodRequest::default().validate(),
            Err(ValidationError::EmptyPatch)
        );
        let patch = PatchFoodRequest {
            calories: Some(300),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(patch.calories, Some(300));
        assert_eq!(patch.image, ImageInput::Keep);
    }

    #[test]
    fn patch_image_options() {
        let patch = PatchFoodRequest {
            remove_image: true,
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(patch.image, ImageInput::Remove);

        let both = PatchFoodRequest {
            remove_image: true,
            image_id: Some(format!("{}.jpg", Uuid::new_v4())),
            ..Default::default()
        };
        assert!(matches!(both.validate(), Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn list_range_resolution() {
        let today = date!(2026 - 10 - 18);
        assert_eq!(ListQuery::default().range(today), Ok((today, today)));

        let q = ListQuery {
            date: Some("2026-10-01".into()),
            ..Default::default()
        };
        assert_eq!(q.range(today), Ok((date!(2026 - 10 - 01), date!(2026 - 10 - 01))));

        let q = ListQuery {
            from: Some("2026-01-01".into()),
            to: Some("2026-12-31".into()),
            ..Default::default()
        };
        assert!(q.range(today).is_ok());

        let too_long = ListQuery {
            from: Some("2025-01-01".into()),
            to: Some("2026-01-02".into()),
            ..Default::default()
        };
        assert!(too_long.range(today).is_err());

        let reversed = ListQuery {
            from: Some("2026-02-01".into()),
            to: Some("2026-01-01".into()),
            ..Default::default()
        };
        assert!(reversed.range(today).is_err());

        let half = ListQuery {
            from: Some("2026-02-01".into()),
            ..Default::default()
        };
        assert!(half.range(today).is_err());
    }

    #[test]
    fn calendar_month_defaults_to_current() {
        let today = date!(2026 - 10 - 18);
        let ym = CalendarQuery::default().month(today).unwrap();
        assert_eq!(ym.to_string(), "2026-10");
        let bad = CalendarQuery {
            month: Some("October".into()),
        };
        assert!(bad.month(today).is_err());
    }
}
