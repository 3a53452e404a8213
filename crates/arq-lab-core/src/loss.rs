//! Per-endpoint channel loss simulation.
//!
//! Each protocol instance owns its own seeded generator so concurrently
//! running demonstrations never contend over shared randomness and a seeded
//! run replays exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides, independently per packet, whether it is dropped before delivery.
#[derive(Debug)]
pub struct LossSimulator {
    rng: StdRng,
    loss_rate: f64,
}

impl LossSimulator {
    /// Deterministic simulator for reproducible runs and tests.
    pub fn seeded(loss_rate: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            loss_rate,
        }
    }

    /// Simulator seeded once from OS entropy at construction.
    pub fn from_entropy(loss_rate: f64) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            loss_rate,
        }
    }

    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    /// Draw one uniform decision: `true` means drop this packet.
    pub fn should_drop(&mut self) -> bool {
        self.rng.random::<f64>() < self.loss_rate
    }
}
