//! Sources of randomness for the simulation.
//!
//! Everything stochastic in a run goes through a [`RandomSource`]: priority
//! classification, cross-tier routing, service times, think times and retry
//! delays. A run owns exactly one source, so a seed fully determines it.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

use crate::models::Timing;

pub trait RandomSource {
    /// Returns `true` with probability `p`.
    fn bernoulli(&mut self, p: f64) -> bool;

    /// Draws from an exponential distribution with the given mean. A mean of
    /// zero or less yields zero.
    fn exponential(&mut self, mean: f64) -> f64;
}

pub struct SeededRandom {
    rng: StdRng,
    timing: Timing,
}

impl SeededRandom {
    pub fn new(seed: u64, timing: Timing) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            timing,
        }
    }
}

impl RandomSource for SeededRandom {
    fn bernoulli(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.rng.gen_bool(p)
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        if mean <= 0.0 {
            return 0.0;
        }
        match self.timing {
            Timing::Constant => mean,
            Timing::Exponential => match Exp::new(1.0 / mean) {
                Ok(dist) => dist.sample(&mut self.rng),
                Err(_) => mean,
            },
        }
    }
}

/// Replays pre-recorded draws in order.
///
/// Certain outcomes (`p <= 0` or `p >= 1`) never consume a scripted coin. Once
/// a script runs dry, `bernoulli` answers `false` and `exponential(mean)`
/// answers `mean`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRandom {
    coins: VecDeque<bool>,
    samples: VecDeque<f64>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coins(mut self, coins: impl IntoIterator<Item = bool>) -> Self {
        self.coins.extend(coins);
        self
    }

    pub fn with_samples(mut self, samples: impl IntoIterator<Item = f64>) -> Self {
        self.samples.extend(samples);
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn bernoulli(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.coins.pop_front().unwrap_or(false)
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        self.samples
            .pop_front()
            .unwrap_or(if mean > 0.0 { mean } else { 0.0 })
    }
}
