use std::collections::VecDeque;

use crate::models::TierConfig;
use crate::random::RandomSource;
use crate::request::{Request, Tier};

/// Cores plus two bounded FIFO waiting lines. A request is either on a core,
/// in exactly one of the queues, or not in this server at all.
#[derive(Clone, Debug)]
pub struct Server {
    pub tier: Tier,
    pub core_count: u32,
    pub busy_cores: u32,
    pub average_service_time: f64,
    pub queue_capacity: usize,
    pub priority_queue: VecDeque<Request>,
    pub regular_queue: VecDeque<Request>,
}

impl Server {
    pub fn new(
        tier: Tier,
        core_count: u32,
        average_service_time: f64,
        queue_capacity: usize,
    ) -> Self {
        Self {
            tier,
            core_count,
            busy_cores: 0,
            average_service_time,
            queue_capacity,
            priority_queue: VecDeque::new(),
            regular_queue: VecDeque::new(),
        }
    }

    pub fn from_config(tier: Tier, config: &TierConfig) -> Self {
        Self::new(tier, config.cores, config.service_time, config.queue_capacity)
    }

    pub fn has_free_core(&self) -> bool {
        self.busy_cores < self.core_count
    }

    pub fn try_acquire_core(&mut self) -> bool {
        if self.has_free_core() {
            self.busy_cores += 1;
            true
        } else {
            false
        }
    }

    pub fn release_core(&mut self) {
        assert!(
            self.busy_cores > 0,
            "{} server released a core while none was busy",
            self.tier.label()
        );
        self.busy_cores -= 1;
    }

    /// Appends to the matching queue. Returns `false` (and drops nothing) if
    /// that queue is already at capacity; the caller owns the rejection.
    pub fn enqueue(&mut self, request: Request, is_priority: bool) -> bool {
        let queue = if is_priority {
            &mut self.priority_queue
        } else {
            &mut self.regular_queue
        };
        if queue.len() >= self.queue_capacity {
            return false;
        }
        queue.push_back(request);
        true
    }

    pub fn dequeue_next(&mut self) -> Option<Request> {
        self.priority_queue
            .pop_front()
            .or_else(|| self.regular_queue.pop_front())
    }

    pub fn sample_service_time(&self, rng: &mut dyn RandomSource) -> f64 {
        rng.exponential(self.average_service_time)
    }

    pub fn queued(&self) -> usize {
        self.priority_queue.len() + self.regular_queue.len()
    }

    pub fn number_in_server(&self) -> usize {
        self.busy_cores as usize + self.queued()
    }

    pub fn utilization(&self) -> f64 {
        if self.core_count == 0 {
            return 0.0;
        }
        f64::from(self.busy_cores) / f64::from(self.core_count)
    }
}
