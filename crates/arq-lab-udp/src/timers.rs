//! Host-side timer table for the UDP control loops.
//!
//! The loops have no parallel timer tasks: every outstanding timer is a
//! deadline in this table, the earliest deadline bounds the next socket
//! read, and deadlines that have passed are handed back as expiries. Timer
//! ids are the same ones the protocols use under the simulator.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct TimerTable {
    deadlines: HashMap<u32, Instant>,
}

impl TimerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a timer. A running id is superseded.
    pub fn start(&mut self, timer_id: u32, delay: Duration) {
        self.deadlines.insert(timer_id, Instant::now() + delay);
    }

    /// Disarm a timer; unknown ids are a no-op.
    pub fn cancel(&mut self, timer_id: u32) {
        self.deadlines.remove(&timer_id);
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Time until the earliest deadline; `Duration::ZERO` if already due,
    /// `None` with no timers armed.
    pub fn until_next(&self) -> Option<Duration> {
        let next = self.deadlines.values().min()?;
        Some(next.saturating_duration_since(Instant::now()))
    }

    /// Remove and return every timer whose deadline has passed.
    pub fn take_expired(&mut self) -> Vec<u32> {
        let now = Instant::now();
        let expired: Vec<u32> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.deadlines.remove(id);
        }
        expired
    }
}
