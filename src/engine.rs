use tracing::info;

use crate::error::{Error, Result};
use crate::events::{Event, EventKind, EventQueue};
use crate::handler::{EventHandler, TierStats};
use crate::models::{SimConfig, TierConfig};
use crate::random::{RandomSource, SeededRandom};
use crate::request::Tier;
use crate::state::{RunMetadata, SimulationResult, SystemMetrics, TierMetrics};

/// Owns the event queue and the handler, and drives the pop/dispatch loop.
pub struct Simulator {
    config: SimConfig,
    queue: EventQueue,
    handler: EventHandler,
    clock: f64,
    events_processed: u64,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        let rng = SeededRandom::new(config.seed.unwrap_or(0), config.timing);
        Self::with_source(config, Box::new(rng))
    }

    /// Builds a simulator drawing from `rng` and seeds one arrival per client
    /// at time zero.
    pub fn with_source(config: SimConfig, rng: Box<dyn RandomSource>) -> Self {
        let mut handler = EventHandler::new(&config, rng);
        let mut queue = EventQueue::new();
        for _ in 0..config.clients {
            let request = handler.new_client_request(0.0);
            queue.push(Event::new(EventKind::Arrival, request, 0.0));
        }

        Self {
            config,
            queue,
            handler,
            clock: 0.0,
            events_processed: 0,
        }
    }

    /// The horizon is checked after an event is handled, so the last handled
    /// event may sit at or past it.
    pub fn is_finished(&self) -> bool {
        self.clock >= self.config.horizon || self.queue.is_empty()
    }

    pub fn step(&mut self) -> Option<EventKind> {
        if self.queue.is_empty() {
            return None;
        }
        let event = self.queue.pop_min();
        let kind = event.kind;
        self.clock = event.time;
        self.handler.handle(event, &mut self.queue);
        self.events_processed += 1;
        Some(kind)
    }

    pub fn run(&mut self) -> SimulationResult {
        info!(
            clients = self.config.clients,
            horizon = self.config.horizon,
            call_mode = %self.config.call_mode,
            "simulation started"
        );
        while !self.is_finished() {
            self.step();
        }

        let result = self.result();
        info!(
            elapsed = result.metadata.elapsed,
            events = result.metadata.events_processed,
            throughput = result.system.throughput,
            drops = result.system.priority_drops + result.system.regular_drops,
            "simulation completed"
        );
        result
    }

    pub fn handler(&self) -> &EventHandler {
        &self.handler
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn result(&self) -> SimulationResult {
        let elapsed = self.clock;
        let system = self.handler.system_stats();

        SimulationResult {
            metadata: RunMetadata {
                seed: self.config.seed.unwrap_or(0),
                call_mode: self.config.call_mode.to_string(),
                timing: self.config.timing.to_string(),
                clients: self.config.clients,
                horizon: self.config.horizon,
                elapsed: round_to(elapsed, 4),
                events_processed: self.events_processed,
                requests_issued: self.handler.requests_issued(),
            },
            app: self.tier_metrics(Tier::Application, elapsed),
            db: self.tier_metrics(Tier::Database, elapsed),
            system: SystemMetrics {
                throughput: round_to(per_unit_time(system.completions.count(), elapsed), 4),
                goodput: system.completions.goodput,
                badput: system.completions.badput,
                completions: system.completions.count(),
                avg_response_time: round_to(system.completions.avg_response_time, 4),
                priority_drops: system.priority_drops,
                regular_drops: system.regular_drops,
                overflow_drops: system.overflow_drops,
                timeout_drops: system.timeout_drops,
                retries: system.retries,
            },
        }
    }

    fn tier_metrics(&self, tier: Tier, elapsed: f64) -> TierMetrics {
        let server = self.handler.server(tier);
        let stats: &TierStats = self.handler.tier_stats(tier);
        let (avg_occupancy, avg_utilization) = if elapsed > 0.0 {
            (
                stats.occupancy_area / elapsed,
                stats.busy_core_area / (elapsed * f64::from(server.core_count)),
            )
        } else {
            (0.0, 0.0)
        };

        TierMetrics {
            name: tier.label().to_string(),
            cores: server.core_count,
            throughput: round_to(per_unit_time(stats.completions.count(), elapsed), 4),
            goodput: stats.completions.goodput,
            badput: stats.completions.badput,
            completions: stats.completions.count(),
            avg_response_time: round_to(stats.completions.avg_response_time, 4),
            occupancy: stats.occupancy,
            peak_occupancy: stats.peak_occupancy,
            avg_occupancy: round_to(avg_occupancy, 4),
            overflow_drops: stats.overflow_drops,
            utilization: round_to(server.utilization(), 4),
            avg_utilization: round_to(avg_utilization, 4),
        }
    }
}

pub fn run_simulation(config: &SimConfig) -> Result<SimulationResult> {
    validate_config(config)?;
    let mut simulator = Simulator::new(config.clone());
    Ok(simulator.run())
}

pub fn validate_config(config: &SimConfig) -> Result<()> {
    validate_tier("app", &config.app)?;
    validate_tier("db", &config.db)?;

    for (name, value) in [
        ("app_to_db_prob", config.app_to_db_prob),
        ("high_priority_prob", config.high_priority_prob),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::InvalidProbability { name, value });
        }
    }

    if !(config.think_time >= 0.0 && config.think_time.is_finite()) {
        return Err(Error::NegativeDuration {
            name: "think_time",
            value: config.think_time,
        });
    }
    // a zero delay would re-admit an overflowed retry at the same instant forever
    if !(config.retry_delay > 0.0 && config.retry_delay.is_finite()) {
        return Err(Error::InvalidRetryDelay(config.retry_delay));
    }

    if !(config.timeout > 0.0) {
        return Err(Error::InvalidTimeout(config.timeout));
    }
    if !(config.horizon > 0.0 && config.horizon.is_finite()) {
        return Err(Error::InvalidHorizon(config.horizon));
    }

    Ok(())
}

fn validate_tier(tier: &'static str, config: &TierConfig) -> Result<()> {
    if config.cores == 0 {
        return Err(Error::ZeroCores(tier));
    }
    if !(config.service_time > 0.0 && config.service_time.is_finite()) {
        return Err(Error::InvalidServiceTime {
            tier,
            value: config.service_time,
        });
    }
    Ok(())
}

fn per_unit_time(count: u64, elapsed: f64) -> f64 {
    if elapsed <= 0.0 {
        0.0
    } else {
        count as f64 / elapsed
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    if decimals == 0 {
        return value.round();
    }
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallMode, Timing};
    use crate::random::ScriptedRandom;

    fn single_core_config() -> SimConfig {
        SimConfig {
            app: TierConfig {
                cores: 1,
                service_time: 1.0,
                queue_capacity: 10,
            },
            app_to_db_prob: 0.0,
            think_time: 0.0,
            clients: 1,
            horizon: 10.0,
            timeout: 1000.0,
            timing: Timing::Constant,
            ..SimConfig::default()
        }
    }

    fn busy_config(call_mode: CallMode) -> SimConfig {
        SimConfig {
            app: TierConfig {
                cores: 2,
                service_time: 1.0,
                queue_capacity: 3,
            },
            db: TierConfig {
                cores: 1,
                service_time: 2.0,
                queue_capacity: 2,
            },
            app_to_db_prob: 0.5,
            think_time: 0.5,
            high_priority_prob: 0.3,
            horizon: 400.0,
            clients: 20,
            retry_delay: 2.0,
            timeout: 6.0,
            call_mode,
            seed: Some(11),
            ..SimConfig::default()
        }
    }

    #[test]
    fn single_client_throughput_matches_completions_over_time() {
        let config = single_core_config();
        let result = run_simulation(&config).expect("simulation should succeed");

        assert_eq!(result.metadata.elapsed, 10.0);
        assert_eq!(result.system.completions, 10);
        assert_eq!(result.system.throughput, 1.0);
        assert_eq!(result.system.badput, 0);
        assert_eq!(result.system.goodput, 10);
        assert_eq!(result.system.avg_response_time, 1.0);
        assert_eq!(result.app.throughput, 1.0);
        assert_eq!(result.db.completions, 0);
        assert_eq!(result.metadata.events_processed, 20);
    }

    #[test]
    fn repeated_timeouts_retry_until_a_badput_completion() {
        let retries = 3;
        let mut config = single_core_config();
        config.app.service_time = 2.0;
        config.timeout = 1.0;
        config.retry_delay = 3.0;
        config.think_time = 1000.0;
        config.horizon = 200.0;

        // each attempt draws a 2.0 service (past the 1.0 timeout) and a 3.0
        // retry delay, until the last attempt finishes in 0.5
        let mut samples = Vec::new();
        for _ in 0..retries {
            samples.extend([2.0, 3.0]);
        }
        samples.push(0.5);
        let rng = ScriptedRandom::new().with_samples(samples);
        let mut simulator = Simulator::with_source(config.clone(), Box::new(rng));
        let result = simulator.run();

        assert_eq!(result.system.timeout_drops, retries);
        assert_eq!(result.system.retries, retries);
        assert_eq!(result.system.overflow_drops, 0);
        assert_eq!(result.system.goodput, 0);
        assert_eq!(result.system.badput, 1);
        assert_eq!(result.app.badput, 1);
        assert_eq!(simulator.handler().failed_count(), retries as usize);
        assert_eq!(simulator.handler().completed_count(), 1);
        assert!(simulator.clock() >= config.horizon);
    }

    fn assert_invariants(simulator: &Simulator, config: &SimConfig) {
        let handler = simulator.handler();
        for (tier, tier_config) in [
            (Tier::Application, &config.app),
            (Tier::Database, &config.db),
        ] {
            let server = handler.server(tier);
            assert!(server.busy_cores <= tier_config.cores);
            assert!(server.priority_queue.len() <= tier_config.queue_capacity);
            assert!(server.regular_queue.len() <= tier_config.queue_capacity);
            let in_server = server.busy_cores as usize
                + server.priority_queue.len()
                + server.regular_queue.len();
            assert_eq!(handler.tier_stats(tier).occupancy, in_server);
        }

        let system = handler.system_stats();
        assert_eq!(handler.completed_count() as u64, system.completions.count());
        assert_eq!(handler.failed_count() as u64, system.drops());
        assert_eq!(system.drops(), system.overflow_drops + system.timeout_drops);
        assert_eq!(system.retries, system.drops());
        let app_busy = handler.server(Tier::Application).busy_cores as usize;
        assert!(handler.held_app_cores() <= app_busy);
    }

    #[test]
    fn invariants_hold_at_every_step() {
        for call_mode in [CallMode::Sync, CallMode::Async] {
            let config = busy_config(call_mode);
            validate_config(&config).expect("config should be valid");
            let mut simulator = Simulator::new(config.clone());
            while !simulator.is_finished() {
                simulator.step();
                assert_invariants(&simulator, &config);
            }

            let result = simulator.result();
            assert!(result.system.completions > 0);
            assert!(result.system.priority_drops + result.system.regular_drops > 0);
            assert!(result.app.avg_utilization <= 1.0);
            assert!(result.db.avg_utilization <= 1.0);
        }
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let config = busy_config(CallMode::Async);
        let first = run_simulation(&config).expect("simulation should succeed");
        let second = run_simulation(&config).expect("simulation should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn no_clients_means_no_events() {
        let mut config = single_core_config();
        config.clients = 0;
        let result = run_simulation(&config).expect("simulation should succeed");
        assert_eq!(result.metadata.events_processed, 0);
        assert_eq!(result.metadata.elapsed, 0.0);
        assert_eq!(result.system.throughput, 0.0);
    }

    #[test]
    fn capacity_overflow_is_dropped_and_retried() {
        let mut config = single_core_config();
        config.app.queue_capacity = 0;
        config.clients = 2;
        config.app.service_time = 5.0;
        config.horizon = 1.0;
        let mut simulator = Simulator::new(config);
        simulator.step();
        simulator.step();

        let system = simulator.handler().system_stats();
        assert_eq!(system.overflow_drops, 1);
        assert_eq!(system.retries, 1);
        assert!(simulator.handler().is_failed(2));
        // two timeouts, one completion, one retry arrival
        assert_eq!(simulator.pending_events(), 4);
    }

    #[test]
    fn zero_retry_delay_is_rejected() {
        let mut config = single_core_config();
        config.app.queue_capacity = 0;
        config.clients = 2;
        config.retry_delay = 0.0;
        assert_eq!(
            run_simulation(&config).unwrap_err().to_string(),
            "retry_delay must be > 0 (got 0)"
        );
    }

    #[test]
    fn overflow_retries_let_the_clock_reach_the_horizon() {
        let mut config = single_core_config();
        config.app.queue_capacity = 0;
        config.clients = 2;
        config.retry_delay = 1e-3;
        validate_config(&config).expect("config should be valid");

        let mut simulator = Simulator::new(config.clone());
        let mut steps = 0;
        while !simulator.is_finished() && steps < 100_000 {
            simulator.step();
            steps += 1;
        }

        assert!(simulator.is_finished());
        assert!(simulator.clock() >= config.horizon);
        assert!(simulator.handler().system_stats().overflow_drops > 0);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut zero_cores = SimConfig::default();
        zero_cores.db.cores = 0;
        assert_eq!(
            run_simulation(&zero_cores).unwrap_err().to_string(),
            "db tier must have at least one core"
        );

        let mut bad_prob = SimConfig::default();
        bad_prob.app_to_db_prob = 1.5;
        assert_eq!(
            run_simulation(&bad_prob).unwrap_err().to_string(),
            "app_to_db_prob must be within [0, 1] (got 1.5)"
        );

        let mut bad_timeout = SimConfig::default();
        bad_timeout.timeout = 0.0;
        assert!(matches!(
            run_simulation(&bad_timeout),
            Err(Error::InvalidTimeout(_))
        ));

        let mut bad_horizon = SimConfig::default();
        bad_horizon.horizon = -1.0;
        assert!(matches!(
            run_simulation(&bad_horizon),
            Err(Error::InvalidHorizon(_))
        ));

        let mut bad_delay = SimConfig::default();
        bad_delay.retry_delay = -0.5;
        assert!(matches!(
            run_simulation(&bad_delay),
            Err(Error::InvalidRetryDelay(_))
        ));

        let mut bad_think = SimConfig::default();
        bad_think.think_time = f64::INFINITY;
        assert!(matches!(
            run_simulation(&bad_think),
            Err(Error::NegativeDuration { name: "think_time", .. })
        ));

        let mut bad_service = SimConfig::default();
        bad_service.app.service_time = 0.0;
        assert!(matches!(
            run_simulation(&bad_service),
            Err(Error::InvalidServiceTime { tier: "app", .. })
        ));
    }
}
