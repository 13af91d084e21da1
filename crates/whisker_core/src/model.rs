//! Records owned by the store and referenced by the cat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FoodId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl fmt::Display for FoodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "food#{}", self.0)
    }
}

/// Someone who pets or feeds the cat. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// A food the cat has been offered at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub id: FoodId,
    pub name: String,
    /// Decided once, at creation, and never changed.
    pub preferred_by_cat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EatEvent {
    pub id: i64,
    pub user_id: UserId,
    pub food_id: FoodId,
    pub is_success: bool,
    pub is_cat_fed: bool,
    pub occurred_at: DateTime<Utc>,
}

impl EatEvent {
    /// An eat event counts as satisfying if the food was eaten or the cat was already full.
    pub fn satisfied(&self) -> bool {
        self.is_success || self.is_cat_fed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetEvent {
    pub id: i64,
    pub user_id: UserId,
    pub is_success: bool,
    pub occurred_at: DateTime<Utc>,
}
