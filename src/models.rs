use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SimConfig {
    #[serde(default = "default_app_tier")]
    pub app: TierConfig,
    #[serde(default = "default_db_tier")]
    pub db: TierConfig,
    #[serde(default = "default_app_to_db_prob")]
    pub app_to_db_prob: f64,
    #[serde(default = "default_think_time")]
    pub think_time: f64,
    #[serde(default = "default_high_priority_prob")]
    pub high_priority_prob: f64,
    #[serde(default = "default_horizon")]
    pub horizon: f64,
    #[serde(default = "default_clients")]
    pub clients: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default)]
    pub call_mode: CallMode,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            app: default_app_tier(),
            db: default_db_tier(),
            app_to_db_prob: default_app_to_db_prob(),
            think_time: default_think_time(),
            high_priority_prob: default_high_priority_prob(),
            horizon: default_horizon(),
            clients: default_clients(),
            retry_delay: default_retry_delay(),
            timeout: default_timeout(),
            call_mode: CallMode::default(),
            timing: Timing::default(),
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TierConfig {
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default = "default_service_time")]
    pub service_time: f64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Whether an application core stays held while its database call runs.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CallMode {
    Sync,
    #[default]
    Async,
}

impl CallMode {
    pub fn holds_app_core(self) -> bool {
        matches!(self, CallMode::Sync)
    }
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallMode::Sync => f.write_str("sync"),
            CallMode::Async => f.write_str("async"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Timing {
    #[default]
    Exponential,
    Constant,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timing::Exponential => f.write_str("exponential"),
            Timing::Constant => f.write_str("constant"),
        }
    }
}

fn default_app_tier() -> TierConfig {
    TierConfig {
        cores: default_cores(),
        service_time: default_service_time(),
        queue_capacity: default_queue_capacity(),
    }
}

fn default_db_tier() -> TierConfig {
    default_app_tier()
}

fn default_cores() -> u32 {
    2
}

fn default_service_time() -> f64 {
    1.0
}

fn default_queue_capacity() -> usize {
    10
}

fn default_app_to_db_prob() -> f64 {
    0.5
}

fn default_think_time() -> f64 {
    1.0
}

fn default_high_priority_prob() -> f64 {
    0.2
}

fn default_horizon() -> f64 {
    1000.0
}

fn default_clients() -> usize {
    10
}

fn default_retry_delay() -> f64 {
    5.0
}

fn default_timeout() -> f64 {
    100.0
}
