//! The Cat: mood state plus the pet/feed decisions.
//!
//! Satiety and pet scales are recomputed from history by a background heartbeat
//! and read by any number of concurrent decisions. Each decision appends exactly
//! one event to the store, so today's outcome feeds tomorrow's mood.

use crate::heartbeat::HeartbeatConfig;
use crate::noise::{NoiseSource, SeededNoise};
use crate::weights::{decay_weights, recency_weights, weighted_sum};
use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use whisker_core::{CatConfig, RecordStore};

/// A decision succeeds when its score is strictly above this.
const ACCEPT_THRESHOLD: f64 = 0.5;

/// Above this satiety the cat counts as already fed.
const FED_THRESHOLD: f64 = 0.75;

/// Benefit of the doubt for people without recent history.
const UNKNOWN_PREDISPOSITION: f64 = 1.0;

/// Background-refreshed part of the mood, both scales in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodState {
    pub satiety: f64,
    pub pet: f64,
}

impl MoodState {
    pub fn new(satiety: f64, pet: f64) -> Self {
        Self { satiety, pet }
    }

    /// Happiness for a given whim: `0.5·satiety + 0.3·pet + 0.2·whim`.
    pub fn happiness(&self, whim: f64) -> f64 {
        0.5 * self.satiety + 0.3 * self.pet + 0.2 * whim
    }
}

pub struct Cat {
    store: Arc<dyn RecordStore>,
    config: CatConfig,
    heartbeat: HeartbeatConfig,
    /// Written only by `recompute_mood` / `set_mood`
    mood: RwLock<MoodState>,
    noise: Arc<dyn NoiseSource>,
}

impl Cat {
    /// Create a cat whose whims come from `config.seed` (or OS entropy).
    pub fn new(store: Arc<dyn RecordStore>, config: CatConfig) -> Self {
        let noise = Arc::new(SeededNoise::from_config(config.seed));
        Self::with_noise(store, config, noise)
    }

    pub fn with_noise(
        store: Arc<dyn RecordStore>,
        config: CatConfig,
        noise: Arc<dyn NoiseSource>,
    ) -> Self {
        let heartbeat = HeartbeatConfig::from(&config);
        Self {
            store,
            config,
            heartbeat,
            mood: RwLock::new(MoodState::default()),
            noise,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    // ========================================================================
    // Mood
    // ========================================================================

    pub async fn mood(&self) -> MoodState {
        *self.mood.read().await
    }

    /// Force the mood (manual intervention or tests). The next heartbeat overwrites it.
    pub async fn set_mood(&self, mood: MoodState) {
        *self.mood.write().await = mood;
    }

    pub async fn satiety_scale(&self) -> f64 {
        self.mood.read().await.satiety
    }

    pub async fn pet_scale(&self) -> f64 {
        self.mood.read().await.pet
    }

    /// Fresh on every call: the whim is redrawn each time.
    pub async fn happiness_scale(&self) -> f64 {
        let mood = self.mood().await;
        self.happiness_from(&mood)
    }

    fn happiness_from(&self, mood: &MoodState) -> f64 {
        let scale = mood.happiness(self.noise.whim());
        tracing::debug!("happiness_scale: {:.3}", scale);
        scale
    }

    /// Recency-weighted share of satisfying meals within the satiety window.
    pub async fn compute_satiety_scale(&self) -> Result<f64> {
        let period = self.config.satiety_period();
        let events = self.store.eat_events_since(period).await?;
        if events.is_empty() {
            tracing::debug!("satiety_scale: 0.0");
            return Ok(0.0);
        }

        let now = Utc::now();
        let ages: Vec<f64> = events
            .iter()
            .map(|e| (now - e.occurred_at).num_milliseconds() as f64 / 1000.0)
            .collect();
        let weights = recency_weights(period.as_secs_f64(), &ages);
        let scale = weighted_sum(&weights, events.iter().map(|e| e.satisfied()));
        tracing::debug!("satiety_scale: {:.3}", scale);
        Ok(scale)
    }

    /// Decay-weighted share of successful pets within the forget window.
    pub async fn compute_pet_scale(&self) -> Result<f64> {
        let flags = self
            .store
            .pet_success_flags_since(self.config.time_to_forget())
            .await?;
        if flags.is_empty() {
            tracing::debug!("pet_scale: 0.0");
            return Ok(0.0);
        }

        let weights = decay_weights(flags.len());
        let scale = weighted_sum(&weights, flags);
        tracing::debug!("pet_scale: {:.3}", scale);
        Ok(scale)
    }

    /// One heartbeat: recompute both scales and publish them together.
    pub async fn recompute_mood(&self) -> Result<MoodState> {
        let satiety = self.compute_satiety_scale().await?;
        let pet = self.compute_pet_scale().await?;
        let mood = MoodState { satiety, pet };
        *self.mood.write().await = mood;
        Ok(mood)
    }

    /// Spawn the heartbeat that keeps the mood current until `shutdown` flips
    /// to `true` (or its sender is dropped).
    pub fn spawn_mood_loop(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let cat = Arc::clone(self);
        let period = self.heartbeat.interval.max(std::time::Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            tracing::info!("Mood loop started ({:?} heartbeat)", period);

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = cat.recompute_mood().await {
                            tracing::warn!("Mood recomputation failed, keeping previous mood: {:#}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Mood loop stopped");
        })
    }

    // ========================================================================
    // Predispositions
    // ========================================================================

    pub async fn predisposition_by_eat(&self, name: &str) -> Result<f64> {
        let events = self
            .store
            .eat_events_for_user_since(name, self.config.time_to_forget())
            .await?;
        if events.is_empty() {
            tracing::debug!("predisposition_by_eat({}): {}", name, UNKNOWN_PREDISPOSITION);
            return Ok(UNKNOWN_PREDISPOSITION);
        }

        let weights = decay_weights(events.len());
        let scale = weighted_sum(&weights, events.iter().map(|e| e.satisfied()));
        tracing::debug!("predisposition_by_eat({}): {:.3}", name, scale);
        Ok(scale)
    }

    pub async fn predisposition_by_pet(&self, name: &str) -> Result<f64> {
        let events = self
            .store
            .pet_events_for_user_since(name, self.config.time_to_forget())
            .await?;
        if events.is_empty() {
            tracing::debug!("predisposition_by_pet({}): {}", name, UNKNOWN_PREDISPOSITION);
            return Ok(UNKNOWN_PREDISPOSITION);
        }

        let weights = decay_weights(events.len());
        let scale = weighted_sum(&weights, events.iter().map(|e| e.is_success));
        tracing::debug!("predisposition_by_pet({}): {:.3}", name, scale);
        Ok(scale)
    }

    pub async fn predisposition_to_eat(&self, name: &str) -> Result<f64> {
        let mood = self.mood().await;
        let by_eat = self.predisposition_by_eat(name).await?;
        let by_pet = self.predisposition_by_pet(name).await?;
        let scale = 0.2 * self.happiness_from(&mood)
            + 0.5 * (1.0 - mood.satiety)
            + 0.2 * by_eat
            + 0.1 * by_pet;
        tracing::debug!("predisposition_to_eat({}): {:.3}", name, scale);
        Ok(scale)
    }

    pub async fn predisposition_to_pet(&self, name: &str) -> Result<f64> {
        let mood = self.mood().await;
        let by_eat = self.predisposition_by_eat(name).await?;
        let by_pet = self.predisposition_by_pet(name).await?;
        let scale = 0.75 * self.happiness_from(&mood) + 0.2 * by_eat + 0.05 * by_pet;
        tracing::debug!("predisposition_to_pet({}): {:.3}", name, scale);
        Ok(scale)
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    /// Offer `food` on behalf of `name`. Returns whether the cat ate it.
    pub async fn feed(&self, name: &str, food: &str) -> Result<bool> {
        let user = self.store.find_or_create_user(name).await?;
        let food = self.store.find_or_create_food(food, self.noise.coin()).await?;

        let preference = if food.preferred_by_cat { 1.0 } else { 0.0 };
        let score = preference * self.predisposition_to_eat(name).await?;
        let success = score > ACCEPT_THRESHOLD;
        let cat_fed = self.satiety_scale().await > FED_THRESHOLD;

        self.store
            .append_eat_event(user, food.id, success, cat_fed)
            .await?;
        tracing::debug!(
            "feed({}, {}): score={:.3} success={} cat_fed={}",
            name, food.name, score, success, cat_fed
        );
        Ok(success)
    }

    /// Pet the cat on behalf of `name`. Returns whether the cat tolerated it.
    pub async fn pet(&self, name: &str) -> Result<bool> {
        let user = self.store.find_or_create_user(name).await?;

        let score = self.predisposition_to_pet(name).await?;
        let success = score > ACCEPT_THRESHOLD;

        self.store.append_pet_event(user, success).await?;
        tracing::debug!("pet({}): score={:.3} success={}", name, score, success);
        Ok(success)
    }
}
