use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};
use time::{format_description::FormatItem, macros::format_description, Date, Month, OffsetDateTime};
use uuid::Uuid;

use crate::error::ValidationError;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Meal category. Declaration order is the order meals are listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl FromStr for MealType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidMealType(s.to_string()))
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged meal entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_type: MealType,
    pub food_name: String,
    pub weight: f64,
    pub calories: i32,
    pub image_url: Option<String>,
    pub image_id: Option<String>,
    #[serde(serialize_with = "serialize_date")]
    pub record_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFoodRecord {
    pub user_id: Uuid,
    pub meal_type: MealType,
    pub food_name: String,
    pub weight: f64,
    pub calories: i32,
    pub image_url: Option<String>,
    pub image_id: Option<String>,
    pub record_date: Date,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ImageChange {
    #[default]
    Keep,
    Set { image_id: String, image_url: String },
    Remove,
}

/// Fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct FoodRecordPatch {
    pub meal_type: Option<MealType>,
    pub food_name: Option<String>,
    pub weight: Option<f64>,
    pub calories: Option<i32>,
    pub record_date: Option<Date>,
    pub image: ImageChange,
}

impl FoodRecordPatch {
    /// Applies the patch in place. Used by stores that do not do it in SQL.
    pub fn apply_to(&self, record: &mut FoodRecord) {
        if let Some(m) = self.meal_type {
            record.meal_type = m;
        }
        if let Some(name) = &self.food_name {
            record.food_name = name.clone();
        }
        if let Some(w) = self.weight {
            record.weight = w;
        }
        if let Some(c) = self.calories {
            record.calories = c;
        }
        if let Some(d) = self.record_date {
            record.record_date = d;
        }
        match &self.image {
            ImageChange::Keep => {}
            ImageChange::Set { image_id, image_url } => {
                record.image_id = Some(image_id.clone());
                record.image_url = Some(image_url.clone());
            }
            ImageChange::Remove => {
                record.image_id = None;
                record.image_url = None;
            }
        }
    }
}

pub fn parse_date(s: &str) -> Result<Date, ValidationError> {
    Date::parse(s.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

pub fn format_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

pub fn serialize_date<S: Serializer>(d: &Date, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_date(*d))
}

/// A calendar month, parsed from `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: Month,
}

impl YearMonth {
    pub fn of(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> Date {
        Date::from_calendar_date(self.year, self.month, 1).unwrap_or(Date::MIN)
    }

    pub fn last_day(&self) -> Date {
        let days = time::util::days_in_year_month(self.year, self.month);
        Date::from_calendar_date(self.year, self.month, days).unwrap_or(Date::MAX)
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year = y.parse::<i32>().map_err(|_| invalid())?;
        let month = m
            .parse::<u8>()
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(invalid)?;
        Ok(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, u8::from(self.month))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn meal_type_parses_case_insensitively() {
        assert_eq!("Lunch".parse::<MealType>(), Ok(MealType::Lunch));
        assert_eq!(" snack ".parse::<MealType>(), Ok(MealType::Snack));
        assert!("brunch".parse::<MealType>().is_err());
        assert!(MealType::Breakfast < MealType::Lunch && MealType::Dinner < MealType::Snack);
    }

    #[test]
    fn dates_use_iso_format() {
        assert_eq!(parse_date("2026-02-28"), Ok(date!(2026 - 02 - 28)));
        assert!(parse_date("2026-02-30").is_err());
        assert!(parse_date("28/02/2026").is_err());
        assert_eq!(format_date(date!(2026 - 03 - 05)), "2026-03-05");
    }

    #[test]
    fn year_month_bounds() {
        let ym: YearMonth = "2024-02".parse().unwrap();
        assert_eq!(ym.first_day(), date!(2024 - 02 - 01));
        assert_eq!(ym.last_day(), date!(2024 - 02 - 29));
        assert_eq!(ym.to_string(), "2024-02");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024-2".parse::<YearMonth>().is_err());
        assert!("202402".parse::<YearMonth>().is_err());
    }

    #[test]
    fn record_serializes_date_as_string() {
        let now = OffsetDateTime::now_utc();
        let record = FoodRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            meal_type: MealType::Dinner,
            food_name: "Ramen".into(),
            weight: 450.0,
            calories: 620,
            image_url: None,
            image_id: None,
            record_date: date!(2026 - 10 - 18),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["record_date"], "2026-10-18");
        assert_eq!(json["meal_type"], "dinner");
    }
}
