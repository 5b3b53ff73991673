use std::time::Duration;

use dashmap::DashMap;
use time::Date;
use uuid::Uuid;

use super::model::FoodRecord;
use crate::cache::TtlCache;

/// Key of a cached listing: one user's records over an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub user_id: Uuid,
    pub from: Date,
    pub to: Date,
}

/// Listing cache with a write generation per user.
///
/// A reader takes the user's generation before querying the store and may
/// only fill the cache if no write bumped it in the meantime, so a list read
/// before a write can never be stored after that write invalidated the user.
pub struct FoodListCache {
    lists: TtlCache<ListKey, Vec<FoodRecord>>,
    generations: DashMap<Uuid, u64>,
}

impl FoodListCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            lists: TtlCache::new(ttl, max_entries),
            generations: DashMap::new(),
        }
    }

    pub fn generation(&self, user_id: Uuid) -> u64 {
        self.generations.get(&user_id).map_or(0, |g| *g)
    }

    pub fn get(&self, key: &ListKey) -> Option<Vec<FoodRecord>> {
        self.lists.get(key)
    }

    /// Stores `records` unless the user was invalidated after `generation`
    /// was read. Returns whether the entry was stored.
    pub fn insert_if_current(
        &self,
        key: ListKey,
        records: Vec<FoodRecord>,
        generation: u64,
    ) -> bool {
        // the generation entry stays locked until the list is in place
        let current = self.generations.entry(key.user_id).or_insert(0);
        if *current != generation {
            return false;
        }
        self.lists.insert(key, records);
        drop(current);
        true
    }

    /// Bumps the user's generation, then drops their cached lists.
    pub fn invalidate_user(&self, user_id: Uuid) -> usize {
        *self.generations.entry(user_id).or_insert(0) += 1;
        self.lists.invalidate_matching(|k| k.user_id == user_id)
    }

    pub fn purge_expired(&self) -> usize {
        self.lists.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
