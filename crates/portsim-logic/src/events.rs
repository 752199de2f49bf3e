//! Time-ordered event queue for the discrete-event loop.
//!
//! Events pop in order of simulated time; events at the same instant pop in
//! the order they were scheduled, so a seeded run always replays the same way.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::container::ProcessingJob;

/// What happens when an event fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// A new ship reaches port waters.
    Arrival,
    /// Berthing manoeuvre finished, crane work can start.
    DockingComplete { ship_id: u32, berth_id: u32 },
    /// Crane work finished; the berth is freed.
    ProcessingComplete { job: ProcessingJob },
    /// Ship has cleared port waters.
    Departure { ship_id: u32 },
    /// Periodic queue-length and utilization sample.
    Sample,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Arrival => "arrival",
            EventKind::DockingComplete { .. } => "docking_complete",
            EventKind::ProcessingComplete { .. } => "processing_complete",
            EventKind::Departure { .. } => "departure",
            EventKind::Sample => "sample",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub at: f64,
    pub seq: u64,
    pub kind: EventKind,
}

impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    // Reversed: BinaryHeap is a max-heap, earliest must come out first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct EventQueue {
    next_seq: u64,
    heap: BinaryHeap<ScheduledEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: f64, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(ScheduledEvent { at, seq, kind });
    }

    /// Time of the next event, if any.
    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.at)
    }

    pub fn pop(&mut self) -> Option<ScheduledEvent> {
        self.heap.pop()
    }

    /// Pop the next event only if it fires at or before `until`.
    pub fn pop_until(&mut self, until: f64) -> Option<ScheduledEvent> {
        match self.peek_time() {
            Some(at) if at <= until => self.heap.pop(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}
