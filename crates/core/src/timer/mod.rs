use std::time::{Duration, Instant};

/// Reported by [`ProgressionTimer::poll`] when the delay of `from` expired.
///
/// `to == from` means the timer was already on the last index and is now
/// holding there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub from: usize,
    pub to: usize,
}

/// Restartable countdown over a per-index delay schedule.
///
/// The timer does not read a clock itself: callers pass `now` to
/// [`start`](Self::start) and [`poll`](Self::poll) and sleep until
/// [`next_deadline`](Self::next_deadline). There is never more than one
/// pending deadline. Stopping keeps no elapsed time, so a later `start`
/// always counts the full delay of its index again.
#[derive(Debug, Default)]
pub struct ProgressionTimer {
    delays: Vec<i64>,
    cursor: usize,
    deadline: Option<Instant>,
    running: bool,
}

impl ProgressionTimer {
    pub fn new(delays: Vec<i64>) -> Self {
        Self {
            delays,
            ..Default::default()
        }
    }

    /// Installs a new schedule. The timer is stopped and rewound.
    pub fn reset(&mut self, delays: Vec<i64>) {
        self.stop();
        self.delays = delays;
        self.cursor = 0;
    }

    /// Starts counting the delay of `from_index`. Restarting while running
    /// replaces the pending deadline.
    pub fn start(&mut self, from_index: usize, now: Instant) {
        self.running = true;
        self.cursor = from_index.min(self.last_index());
        self.deadline = self.delay_at(self.cursor).and_then(|delay| now.checked_add(delay));
        tracing::trace!(index = self.cursor, deadline = ?self.deadline, "timer started");
    }

    pub fn stop(&mut self) {
        if self.running {
            tracing::trace!(index = self.cursor, "timer stopped");
        }
        self.running = false;
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Index whose delay is currently being counted.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// `None` when stopped, or when holding on the last index.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.running {
            self.deadline
        } else {
            None
        }
    }

    /// Fires at most one expiry. The following deadline is anchored to the
    /// expired one, so a late poll catches up instead of drifting.
    pub fn poll(&mut self, now: Instant) -> Option<Advance> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }

        let from = self.cursor;
        if from < self.last_index() {
            self.cursor = from + 1;
            self.deadline = self
                .delay_at(self.cursor)
                .and_then(|delay| deadline.checked_add(delay));
        } else {
            self.deadline = None;
        }

        tracing::trace!(from, to = self.cursor, "timer expired");
        Some(Advance {
            from,
            to: self.cursor,
        })
    }

    fn last_index(&self) -> usize {
        self.delays.len().saturating_sub(1)
    }

    fn delay_at(&self, index: usize) -> Option<Duration> {
        self.delays.get(index).map(|ms| delay_duration(*ms))
    }
}

/// Converts a schedule entry to a sleep length. Non-positive delays expire
/// immediately.
pub fn delay_duration(delay_ms: i64) -> Duration {
    if delay_ms <= 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(delay_ms as u64)
    }
}
