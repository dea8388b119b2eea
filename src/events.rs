use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;

use crate::request::Request;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    Arrival,
    AppServerComplete,
    DbServerComplete,
    Timeout,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Arrival => "arrival",
            EventKind::AppServerComplete => "app-complete",
            EventKind::DbServerComplete => "db-complete",
            EventKind::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub request: Request,
    pub time: f64,
}

impl Event {
    pub fn new(kind: EventKind, request: Request, time: f64) -> Self {
        Self {
            kind,
            request,
            time,
        }
    }
}

#[derive(Clone, Debug)]
struct ScheduledEvent {
    seq: u64,
    event: Event,
}

// Events at the same time pop in the order they were pushed.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.event
            .time
            .total_cmp(&other.event.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(ScheduledEvent { seq, event }));
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(scheduled)| scheduled.event)
    }

    /// Pops the earliest event.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty; the driver never pops an empty queue.
    pub fn pop_min(&mut self) -> Event {
        self.pop().expect("pop_min called on an empty event queue")
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
