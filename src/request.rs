pub type RequestId = u64;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Priority {
    High,
    Low,
}

impl Priority {
    pub fn is_high(self) -> bool {
        matches!(self, Priority::High)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Tier {
    Application,
    Database,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Application => "app",
            Tier::Database => "db",
        }
    }
}

/// One unit of work. A retry is a new `Request`, never a mutated one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub priority: Priority,
    pub timeout: f64,
    pub target: Tier,
    pub arrival_time: f64,
    /// Set on retries so the eventual completion counts as badput.
    pub is_timed_out: bool,
}

/// Simulation-scoped id sequence. Ids start at 1 and are never reused.
#[derive(Clone, Debug, Default)]
pub struct RequestIds {
    next: RequestId,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(
        &mut self,
        priority: Priority,
        timeout: f64,
        arrival_time: f64,
        is_timed_out: bool,
    ) -> Request {
        self.next += 1;
        Request {
            id: self.next,
            priority,
            timeout,
            target: Tier::Application,
            arrival_time,
            is_timed_out,
        }
    }

    pub fn issued(&self) -> u64 {
        self.next
    }
}
