//! # Whisker Limbic System
//!
//! The cat's moods. Interaction history from the record store is condensed into
//! a handful of scales, and those scales decide whether a pet or a meal is accepted.
//!
//! ## Scales
//!
//! - **Satiety**: linear recency weighting of recent meals (global, short window)
//! - **Pet**: geometric decay weighting of recent petting outcomes (global)
//! - **Happiness**: satiety + pet + a fresh whim on every read
//! - **Predisposition**: happiness blended with one person's own history
//!
//! Satiety and pet are refreshed by a background heartbeat; everything else is
//! computed on demand.

mod cat;
mod heartbeat;
mod noise;
pub mod weights;

pub use cat::{Cat, MoodState};
pub use heartbeat::HeartbeatConfig;
pub use noise::{FixedNoise, NoiseSource, SeededNoise};
