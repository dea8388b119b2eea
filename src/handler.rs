//! The event-handling state machine.
//!
//! State lives in the two [`Server`]s plus three id sets. `failed` and
//! `completed` are tombstones: events already queued for a resolved request
//! stay in the queue and are recognised here when they pop. `held_app_cores`
//! tracks requests whose application core is parked for a synchronous
//! database call.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::events::{Event, EventKind, EventQueue};
use crate::models::{CallMode, SimConfig};
use crate::random::RandomSource;
use crate::request::{Priority, Request, RequestId, RequestIds, Tier};
use crate::server::Server;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureCause {
    Overflow(Tier),
    Timeout,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompletionStats {
    pub goodput: u64,
    pub badput: u64,
    pub avg_response_time: f64,
}

impl CompletionStats {
    pub fn count(&self) -> u64 {
        self.goodput + self.badput
    }

    fn record(&mut self, response_time: f64, previously_failed: bool) {
        if previously_failed {
            self.badput += 1;
        } else {
            self.goodput += 1;
        }
        let n = self.count() as f64;
        self.avg_response_time += (response_time - self.avg_response_time) / n;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TierStats {
    pub completions: CompletionStats,
    pub occupancy: usize,
    pub peak_occupancy: usize,
    pub overflow_drops: u64,
    /// Integral of number-in-server over simulated time.
    pub occupancy_area: f64,
    /// Integral of busy cores over simulated time.
    pub busy_core_area: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemStats {
    pub completions: CompletionStats,
    pub priority_drops: u64,
    pub regular_drops: u64,
    pub overflow_drops: u64,
    pub timeout_drops: u64,
    pub retries: u64,
}

impl SystemStats {
    pub fn drops(&self) -> u64 {
        self.priority_drops + self.regular_drops
    }
}

#[derive(Clone, Copy, Debug)]
struct Workload {
    app_to_db_prob: f64,
    think_time: f64,
    high_priority_prob: f64,
    retry_delay: f64,
    timeout: f64,
    call_mode: CallMode,
}

pub struct EventHandler {
    app: Server,
    db: Server,
    rng: Box<dyn RandomSource>,
    ids: RequestIds,
    workload: Workload,
    failed: HashSet<RequestId>,
    completed: HashSet<RequestId>,
    held_app_cores: HashSet<RequestId>,
    app_stats: TierStats,
    db_stats: TierStats,
    system: SystemStats,
    clock: f64,
}

impl EventHandler {
    pub fn new(config: &SimConfig, rng: Box<dyn RandomSource>) -> Self {
        Self {
            app: Server::from_config(Tier::Application, &config.app),
            db: Server::from_config(Tier::Database, &config.db),
            rng,
            ids: RequestIds::new(),
            workload: Workload {
                app_to_db_prob: config.app_to_db_prob,
                think_time: config.think_time,
                high_priority_prob: config.high_priority_prob,
                retry_delay: config.retry_delay,
                timeout: config.timeout,
                call_mode: config.call_mode,
            },
            failed: HashSet::new(),
            completed: HashSet::new(),
            held_app_cores: HashSet::new(),
            app_stats: TierStats::default(),
            db_stats: TierStats::default(),
            system: SystemStats::default(),
            clock: 0.0,
        }
    }

    /// Mints a fresh client request arriving at `arrival_time`.
    pub fn new_client_request(&mut self, arrival_time: f64) -> Request {
        let priority = if self.rng.bernoulli(self.workload.high_priority_prob) {
            Priority::High
        } else {
            Priority::Low
        };
        self.ids
            .mint(priority, self.workload.timeout, arrival_time, false)
    }

    pub fn handle(&mut self, event: Event, queue: &mut EventQueue) {
        let now = event.time;
        self.integrate_until(now);
        trace!(
            kind = %event.kind,
            request_id = event.request.id,
            time = now,
            "handling event"
        );

        match event.kind {
            EventKind::Arrival => self.on_arrival(event.request, now, queue),
            EventKind::AppServerComplete => self.on_app_complete(event.request, now, queue),
            EventKind::DbServerComplete => self.on_db_complete(event.request, now, queue),
            EventKind::Timeout => self.on_timeout(event.request, now, queue),
        }

        self.refresh_occupancy();
    }

    fn on_arrival(&mut self, request: Request, now: f64, queue: &mut EventQueue) {
        queue.push(Event::new(
            EventKind::Timeout,
            request,
            now + request.timeout,
        ));
        self.admit(Tier::Application, request, now, queue);
    }

    fn on_app_complete(&mut self, request: Request, now: f64, queue: &mut EventQueue) {
        if self.failed.contains(&request.id) {
            trace!(request_id = request.id, "app completion for failed request");
            self.app.release_core();
        } else {
            self.app_stats
                .completions
                .record(now - request.arrival_time, request.is_timed_out);

            if self.rng.bernoulli(self.workload.app_to_db_prob) {
                if self.workload.call_mode.holds_app_core() {
                    self.held_app_cores.insert(request.id);
                } else {
                    self.app.release_core();
                }
                self.admit(Tier::Database, request, now, queue);
            } else {
                self.app.release_core();
                self.complete(request, now, queue);
            }
        }

        self.redispatch(Tier::Application, now, queue);
    }

    fn on_db_complete(&mut self, request: Request, now: f64, queue: &mut EventQueue) {
        self.db.release_core();
        self.release_held_app_core(request.id);

        if self.failed.contains(&request.id) {
            trace!(request_id = request.id, "db completion for failed request");
        } else {
            self.db_stats
                .completions
                .record(now - request.arrival_time, request.is_timed_out);
            self.admit(Tier::Application, request, now, queue);
        }

        self.redispatch(Tier::Database, now, queue);
        self.redispatch(Tier::Application, now, queue);
    }

    fn on_timeout(&mut self, request: Request, now: f64, queue: &mut EventQueue) {
        if self.completed.contains(&request.id) || self.failed.contains(&request.id) {
            trace!(request_id = request.id, "stale timeout");
            return;
        }
        self.admission_failure(request, now, FailureCause::Timeout, queue);
    }

    /// Starts service on a free core, otherwise waits in the tier's bounded
    /// queue, otherwise fails admission.
    fn admit(&mut self, tier: Tier, request: Request, now: f64, queue: &mut EventQueue) {
        if self.server_mut(tier).try_acquire_core() {
            self.start_service(tier, request, now, queue);
        } else if !self
            .server_mut(tier)
            .enqueue(request, request.priority.is_high())
        {
            self.admission_failure(request, now, FailureCause::Overflow(tier), queue);
        }
    }

    fn start_service(&mut self, tier: Tier, request: Request, now: f64, queue: &mut EventQueue) {
        let (server, kind) = match tier {
            Tier::Application => (&self.app, EventKind::AppServerComplete),
            Tier::Database => (&self.db, EventKind::DbServerComplete),
        };
        let service_time = server.sample_service_time(self.rng.as_mut());
        trace!(
            tier = tier.label(),
            request_id = request.id,
            service_time,
            "dispatched"
        );
        queue.push(Event::new(kind, request, now + service_time));
    }

    /// Fills free cores from the waiting lines, skipping tombstoned requests.
    fn redispatch(&mut self, tier: Tier, now: f64, queue: &mut EventQueue) {
        while self.server(tier).has_free_core() {
            let Some(next) = self.server_mut(tier).dequeue_next() else {
                break;
            };
            if self.failed.contains(&next.id) {
                trace!(
                    tier = tier.label(),
                    request_id = next.id,
                    "discarding failed request from queue"
                );
                if tier == Tier::Database {
                    self.release_held_app_core(next.id);
                }
                continue;
            }
            self.server_mut(tier).try_acquire_core();
            self.start_service(tier, next, now, queue);
        }
    }

    /// The single place a parked application core is given back.
    fn release_held_app_core(&mut self, id: RequestId) {
        if self.held_app_cores.remove(&id) {
            self.app.release_core();
        }
    }

    fn complete(&mut self, request: Request, now: f64, queue: &mut EventQueue) {
        let inserted = self.completed.insert(request.id);
        debug_assert!(inserted, "request {} completed twice", request.id);
        self.system
            .completions
            .record(now - request.arrival_time, request.is_timed_out);

        let think_time = self.rng.exponential(self.workload.think_time);
        let next = self.new_client_request(now + think_time);
        trace!(
            request_id = request.id,
            next_request_id = next.id,
            next_arrival = next.arrival_time,
            "completed"
        );
        queue.push(Event::new(EventKind::Arrival, next, next.arrival_time));
    }

    fn admission_failure(
        &mut self,
        request: Request,
        now: f64,
        cause: FailureCause,
        queue: &mut EventQueue,
    ) {
        let inserted = self.failed.insert(request.id);
        debug_assert!(inserted, "request {} failed twice", request.id);

        match request.priority {
            Priority::High => self.system.priority_drops += 1,
            Priority::Low => self.system.regular_drops += 1,
        }
        match cause {
            FailureCause::Overflow(tier) => {
                self.system.overflow_drops += 1;
                self.tier_stats_mut(tier).overflow_drops += 1;
                if tier == Tier::Database {
                    self.release_held_app_core(request.id);
                }
            }
            FailureCause::Timeout => self.system.timeout_drops += 1,
        }

        let delay = self.rng.exponential(self.workload.retry_delay);
        let retry = self
            .ids
            .mint(request.priority, self.workload.timeout, now + delay, true);
        self.system.retries += 1;
        debug!(
            request_id = request.id,
            retry_id = retry.id,
            ?cause,
            retry_at = retry.arrival_time,
            "admission failure"
        );
        queue.push(Event::new(EventKind::Arrival, retry, retry.arrival_time));
    }

    fn integrate_until(&mut self, now: f64) {
        let elapsed = (now - self.clock).max(0.0);
        for (stats, server) in [
            (&mut self.app_stats, &self.app),
            (&mut self.db_stats, &self.db),
        ] {
            stats.occupancy_area += server.number_in_server() as f64 * elapsed;
            stats.busy_core_area += f64::from(server.busy_cores) * elapsed;
        }
        self.clock = self.clock.max(now);
    }

    fn refresh_occupancy(&mut self) {
        for (stats, server) in [
            (&mut self.app_stats, &self.app),
            (&mut self.db_stats, &self.db),
        ] {
            stats.occupancy = server.number_in_server();
            stats.peak_occupancy = stats.peak_occupancy.max(stats.occupancy);
        }
    }

    fn server_mut(&mut self, tier: Tier) -> &mut Server {
        match tier {
            Tier::Application => &mut self.app,
            Tier::Database => &mut self.db,
        }
    }

    fn tier_stats_mut(&mut self, tier: Tier) -> &mut TierStats {
        match tier {
            Tier::Application => &mut self.app_stats,
            Tier::Database => &mut self.db_stats,
        }
    }

    pub fn server(&self, tier: Tier) -> &Server {
        match tier {
            Tier::Application => &self.app,
            Tier::Database => &self.db,
        }
    }

    pub fn tier_stats(&self, tier: Tier) -> &TierStats {
        match tier {
            Tier::Application => &self.app_stats,
            Tier::Database => &self.db_stats,
        }
    }

    pub fn system_stats(&self) -> &SystemStats {
        &self.system
    }

    pub fn is_failed(&self, id: RequestId) -> bool {
        self.failed.contains(&id)
    }

    pub fn is_completed(&self, id: RequestId) -> bool {
        self.completed.contains(&id)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn held_app_cores(&self) -> usize {
        self.held_app_cores.len()
    }

    pub fn requests_issued(&self) -> u64 {
        self.ids.issued()
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }
}
