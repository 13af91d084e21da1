pub mod config;
pub mod model;

pub use config::{CatConfig, LoggingConfig, ServerConfig, StoreConfig, WhiskerConfig};
pub use model::{EatEvent, Food, FoodId, PetEvent, User, UserId};

use async_trait::async_trait;
use std::time::Duration;

/// Durable interaction history the cat's mood is derived from.
///
/// Users and foods are created lazily and never change afterwards; events are
/// append-only. Every history read returns rows most-recent-first.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the user by name, creating it on first use.
    async fn find_or_create_user(&self, name: &str) -> anyhow::Result<UserId>;

    /// Fetch the food by name, creating it with `preferred_if_new` on first use.
    /// The stored preference wins for foods that already exist.
    async fn find_or_create_food(&self, name: &str, preferred_if_new: bool) -> anyhow::Result<Food>;

    async fn append_eat_event(
        &self,
        user: UserId,
        food: FoodId,
        is_success: bool,
        is_cat_fed: bool,
    ) -> anyhow::Result<()>;

    async fn append_pet_event(&self, user: UserId, is_success: bool) -> anyhow::Result<()>;

    /// All eat events inside the window (global, for satiety).
    async fn eat_events_since(&self, window: Duration) -> anyhow::Result<Vec<EatEvent>>;

    /// Success flags of all pet events inside the window (global, for the pet scale).
    async fn pet_success_flags_since(&self, window: Duration) -> anyhow::Result<Vec<bool>>;

    async fn eat_events_for_user_since(
        &self,
        name: &str,
        window: Duration,
    ) -> anyhow::Result<Vec<EatEvent>>;

    async fn pet_events_for_user_since(
        &self,
        name: &str,
        window: Duration,
    ) -> anyhow::Result<Vec<PetEvent>>;
}
