//! Sources of the cat's whims.
//!
//! Happiness carries a random component and new foods get a random preference.
//! Both draws go through [`NoiseSource`] so a seed (or a constant) makes the
//! whole decision pipeline reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

pub trait NoiseSource: Send + Sync {
    /// A uniform draw from `{0.01, 0.02, ..., 1.0}`.
    fn whim(&self) -> f64;

    /// A fair coin, used for the preference of a food the cat has never seen.
    fn coin(&self) -> bool;
}

/// `StdRng`-backed noise, seeded or drawn from OS entropy.
pub struct SeededNoise {
    rng: Mutex<StdRng>,
}

impl SeededNoise {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_config(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => {
                tracing::info!("Cat whims seeded with {}", seed);
                Self::from_seed(seed)
            }
            None => Self::from_entropy(),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn whim(&self) -> f64 {
        let k: u32 = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(1..=100);
        f64::from(k) / 100.0
    }

    fn coin(&self) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(0.5)
    }
}

/// Constant noise for deterministic replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedNoise {
    pub whim: f64,
    pub coin: bool,
}

impl NoiseSource for FixedNoise {
    fn whim(&self) -> f64 {
        self.whim
    }

    fn coin(&self) -> bool {
        self.coin
    }
}
