use serde::Serialize;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RunMetadata {
    pub seed: u64,
    pub call_mode: String,
    pub timing: String,
    pub clients: usize,
    pub horizon: f64,
    pub elapsed: f64,
    pub events_processed: u64,
    pub requests_issued: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TierMetrics {
    pub name: String,
    pub cores: u32,
    pub throughput: f64,
    pub goodput: u64,
    pub badput: u64,
    pub completions: u64,
    pub avg_response_time: f64,
    pub occupancy: usize,
    pub peak_occupancy: usize,
    pub avg_occupancy: f64,
    pub overflow_drops: u64,
    /// Busy cores over core count when the run stopped.
    pub utilization: f64,
    pub avg_utilization: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SystemMetrics {
    pub throughput: f64,
    pub goodput: u64,
    pub badput: u64,
    pub completions: u64,
    pub avg_response_time: f64,
    pub priority_drops: u64,
    pub regular_drops: u64,
    pub overflow_drops: u64,
    pub timeout_drops: u64,
    pub retries: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SimulationResult {
    pub metadata: RunMetadata,
    pub app: TierMetrics,
    pub db: TierMetrics,
    pub system: SystemMetrics,
}
