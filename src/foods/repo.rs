use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::model::{FoodRecord, FoodRecordPatch, ImageChange, MealType, NewFoodRecord};

/// Persistence for food records. Ownership is checked by the caller.
#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn insert(&self, new: NewFoodRecord) -> anyhow::Result<FoodRecord>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<FoodRecord>>;
    /// Records of `user_id` with `from <= record_date <= to`, in listing order.
    async fn list_range(&self, user_id: Uuid, from: Date, to: Date)
        -> anyhow::Result<Vec<FoodRecord>>;
    async fn update(&self, id: Uuid, patch: &FoodRecordPatch) -> anyhow::Result<Option<FoodRecord>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// How many of `user_id`'s records point at `image_id`.
    async fn image_references(&self, user_id: Uuid, image_id: &str) -> anyhow::Result<i64>;
}

#[derive(Debug, FromRow)]
struct FoodRecordRow {
    id: Uuid,
    user_id: Uuid,
    meal_type: String,
    food_name: String,
    weight: f64,
    calories: i32,
    image_url: Option<String>,
    image_id: Option<String>,
    record_date: Date,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<FoodRecordRow> for FoodRecord {
    type Error = anyhow::Error;

    fn try_from(r: FoodRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            meal_type: r
                .meal_type
                .parse::<MealType>()
                .with_context(|| format!("food_records.meal_type of {}", r.id))?,
            id: r.id,
            user_id: r.user_id,
            food_name: r.food_name,
            weight: r.weight,
            calories: r.calories,
            image_url: r.image_url,
            image_id: r.image_id,
            record_date: r.record_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const COLUMNS: &str = "id, user_id, meal_type, food_name, weight, calories, image_url, image_id, \
                       record_date, created_at, updated_at";

pub struct PgFoodStore {
    db: PgPool,
}

impl PgFoodStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodStore for PgFoodStore {
    async fn insert(&self, new: NewFoodRecord) -> anyhow::Result<FoodRecord> {
        let row = sqlx::query_as::<_, FoodRecordRow>(&format!(
            r#"
            INSERT INTO food_records
                (id, user_id, meal_type, food_name, weight, calories, image_url, image_id, record_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.meal_type.as_str())
        .bind(&new.food_name)
        .bind(new.weight)
        .bind(new.calories)
        .bind(&new.image_url)
        .bind(&new.image_id)
        .bind(new.record_date)
        .fetch_one(&self.db)
        .await
        .context("insert food record")?;
        row.try_into()
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<FoodRecord>> {
        let row = sqlx::query_as::<_, FoodRecordRow>(&format!(
            "SELECT {COLUMNS} FROM food_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find food record")?;
        row.map(FoodRecord::try_from).transpose()
    }

    async fn list_range(
        &self,
        user_id: Uuid,
        from: Date,
        to: Date,
    ) -> anyhow::Result<Vec<FoodRecord>> {
        let rows = sqlx::query_as::<_, FoodRecordRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM food_records
            WHERE user_id = $1 AND record_date BETWEEN $2 AND $3
            ORDER BY record_date,
                     CASE meal_type
                         WHEN 'breakfast' THEN 0
                         WHEN 'lunch' THEN 1
                         WHEN 'dinner' THEN 2
                         ELSE 3
                     END,
                     created_at
            "#
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await
        .context("list food records")?;
        rows.into_iter().map(FoodRecord::try_from).collect()
    }

    async fn update(&self, id: Uuid, patch: &FoodRecordPatch) -> anyhow::Result<Option<FoodRecord>> {
        let (image_changed, image_id, image_url) = match &patch.image {
            ImageChange::Keep => (false, None, None),
            ImageChange::Set { image_id, image_url } => {
                (true, Some(image_id.as_str()), Some(image_url.as_str()))
            }
            ImageChange::Remove => (true, None, None),
        };
        let row = sqlx::query_as::<_, FoodRecordRow>(&format!(
            r#"
            UPDATE food_records SET
                meal_type   = COALESCE($2, meal_type),
                food_name   = COALESCE($3, food_name),
                weight      = COALESCE($4, weight),
                calories    = COALESCE($5, calories),
                record_date = COALESCE($6, record_date),
                image_id    = CASE WHEN $7 THEN $8 ELSE image_id END,
                image_url   = CASE WHEN $7 THEN $9 ELSE image_url END,
                updated_at  = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.meal_type.map(|m| m.as_str()))
        .bind(patch.food_name.as_deref())
        .bind(patch.weight)
        .bind(patch.calories)
        .bind(patch.record_date)
        .bind(image_changed)
        .bind(image_id)
        .bind(image_url)
        .fetch_optional(&self.db)
        .await
        .context("update food record")?;
        row.map(FoodRecord::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM food_records WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete food record")?;
        Ok(res.rows_affected() > 0)
    }

    async fn image_references(&self, user_id: Uuid, image_id: &str) -> anyhow::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM food_records WHERE user_id = $1 AND image_id = $2",
        )
        .bind(user_id)
        .bind(image_id)
        .fetch_one(&self.db)
        .await
        .context("count image references")
    }
}

/// Store backed by a map, for tests that should not need Postgres.
#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    pub struct MemoryFoodStore {
        records: RwLock<HashMap<Uuid, FoodRecord>>,
    }

    #[async_trait]
    impl FoodStore for MemoryFoodStore {
        async fn insert(&self, new: NewFoodRecord) -> anyhow::Result<FoodRecord> {
            let now = OffsetDateTime::now_utc();
            let record = FoodRecord {
                id: Uuid::new_v4(),
                user_id: new.user_id,
                meal_type: new.meal_type,
                food_name: new.food_name,
                weight: new.weight,
                calories: new.calories,
                image_url: new.image_url,
                image_id: new.image_id,
                record_date: new.record_date,
                created_at: now,
                updated_at: now,
            };
            self.records.write().await.insert(record.id, record.clone());
            Ok(record)
        }

        async fn find(&self, id: Uuid) -> anyhow::Result<Option<FoodRecord>> {
            Ok(self.records.read().await.get(&id).cloned())
        }

        async fn list_range(
            &self,
            user_id: Uuid,
            from: Date,
            to: Date,
        ) -> anyhow::Result<Vec<FoodRecord>> {
            let mut out: Vec<FoodRecord> = self
                .records
                .read()
                .await
                .values()
                .filter(|r| r.user_id == user_id && r.record_date >= from && r.record_date <= to)
                .cloned()
                .collect();
            out.sort_by_key(|r| (r.record_date, r.meal_type, r.created_at));
            Ok(out)
        }

        async fn update(
            &self,
            id: Uuid,
            patch: &FoodRecordPatch,
        ) -> anyhow::Result<Option<FoodRecord>> {
            let mut records = self.records.write().await;
            Ok(records.get_mut(&id).map(|r| {
                patch.apply_to(r);
                r.updated_at = OffsetDateTime::now_utc();
                r.clone()
            }))
        }

        async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
            Ok(self.records.write().await.remove(&id).is_some())
        }

        async fn image_references(&self, user_id: Uuid, image_id: &str) -> anyhow::Result<i64> {
            let count = self
                .records
                .read()
                .await
                .values()
                .filter(|r| r.user_id == user_id && r.image_id.as_deref() == Some(image_id))
                .count();
            Ok(count as i64)
        }
    }
}
