use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_END_BUFFER_MS, DEFAULT_PLAIN_DELAY_MS};
use crate::lrc::{TimedLine, TimedWord};

/// One highlightable unit of a timeline: a line, or a word in single-item mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub text: String,
    pub timestamp_ms: Option<i64>,
}

/// Position of an item relative to the active one, used by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    Past,
    Current,
    Future,
}

/// Ordered items plus the delay to hold on each of them.
///
/// `delays[i]` is how long item `i` stays active before item `i + 1` takes
/// over; the last entry is the end buffer. Delays may be zero or negative
/// when the source timestamps are out of order, which the timer treats as
/// "advance immediately".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    items: Vec<TimelineItem>,
    delays: Vec<i64>,
    end_buffer_ms: i64,
    fallback_delay_ms: i64,
}

impl Timeline {
    /// Builds a timeline from arbitrary items. An empty list becomes a single
    /// empty item so the index space is never empty.
    pub fn new(mut items: Vec<TimelineItem>, end_buffer_ms: i64) -> Self {
        if items.is_empty() {
            items.push(TimelineItem {
                text: String::new(),
                timestamp_ms: None,
            });
        }

        let mut timeline = Self {
            items,
            delays: Vec::new(),
            end_buffer_ms,
            fallback_delay_ms: DEFAULT_PLAIN_DELAY_MS,
        };
        timeline.recompute_delays();
        timeline
    }

    pub fn from_lines(lines: &[TimedLine], end_buffer_ms: i64) -> Self {
        let items = lines
            .iter()
            .map(|line| TimelineItem {
                text: line.text.clone(),
                timestamp_ms: line.timestamp_ms,
            })
            .collect();
        Self::new(items, end_buffer_ms)
    }

    pub fn from_words(words: &[TimedWord], end_buffer_ms: i64) -> Self {
        let items = words
            .iter()
            .map(|word| TimelineItem {
                text: word.text.clone(),
                timestamp_ms: Some(word.timestamp_ms),
            })
            .collect();
        Self::new(items, end_buffer_ms)
    }

    /// Replaces item timestamps positionally. Items past the end of
    /// `timestamps_ms` become untimed.
    pub fn with_timestamps(mut self, timestamps_ms: &[i64]) -> Self {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.timestamp_ms = timestamps_ms.get(index).copied();
        }
        self.recompute_delays();
        self
    }

    /// Sets the cadence used between items that lack timestamps.
    pub fn with_fallback_delay(mut self, delay_ms: i64) -> Self {
        self.fallback_delay_ms = delay_ms;
        self.recompute_delays();
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.items.len().saturating_sub(1)
    }

    pub fn items(&self) -> &[TimelineItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&TimelineItem> {
        self.items.get(index)
    }

    pub fn delays(&self) -> &[i64] {
        &self.delays
    }

    pub fn end_buffer_ms(&self) -> i64 {
        self.end_buffer_ms
    }

    /// `true` when every item carries a timestamp.
    pub fn is_timed(&self) -> bool {
        self.items.iter().all(|item| item.timestamp_ms.is_some())
    }

    /// `true` when at least one item carries a timestamp.
    pub fn has_timestamps(&self) -> bool {
        self.items.iter().any(|item| item.timestamp_ms.is_some())
    }

    pub fn timestamp_ms(&self, index: usize) -> Option<i64> {
        self.items.get(index).and_then(|item| item.timestamp_ms)
    }

    /// Timestamp of `index` in seconds, the unit reported to hosts.
    pub fn time_seconds(&self, index: usize) -> Option<f64> {
        self.timestamp_ms(index).map(|ms| ms as f64 / 1000.0)
    }

    /// Clamps a possibly negative or oversized request into `[0, len - 1]`.
    pub fn clamp_index(&self, index: i64) -> usize {
        if index <= 0 {
            0
        } else {
            (index as u64).min(self.last_index() as u64) as usize
        }
    }

    pub fn status(&self, index: usize, current: usize) -> LineStatus {
        match index.cmp(&current) {
            std::cmp::Ordering::Less => LineStatus::Past,
            std::cmp::Ordering::Equal => LineStatus::Current,
            std::cmp::Ordering::Greater => LineStatus::Future,
        }
    }

    fn recompute_delays(&mut self) {
        self.delays = if self.is_timed() {
            let stamps: Vec<i64> = self.items.iter().filter_map(|i| i.timestamp_ms).collect();
            derive_delays(&stamps, self.end_buffer_ms)
        } else {
            let stamps: Vec<Option<i64>> = self.items.iter().map(|i| i.timestamp_ms).collect();
            derive_partial_delays(&stamps, self.end_buffer_ms, self.fallback_delay_ms)
        };
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_END_BUFFER_MS)
    }
}

/// Delays between consecutive timestamps, followed by `end_buffer_ms`.
pub fn derive_delays(timestamps_ms: &[i64], end_buffer_ms: i64) -> Vec<i64> {
    timestamps_ms
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .chain((!timestamps_ms.is_empty()).then_some(end_buffer_ms))
        .collect()
}

/// Constant cadence for untimed lyrics.
pub fn plain_delays(len: usize, delay_ms: i64) -> Vec<i64> {
    vec![delay_ms; len]
}

// Pairs missing either timestamp fall back to the plain cadence.
fn derive_partial_delays(timestamps: &[Option<i64>], end_buffer_ms: i64, fallback_ms: i64) -> Vec<i64> {
    if timestamps.iter().all(Option::is_none) {
        return plain_delays(timestamps.len(), fallback_ms);
    }

    (0..timestamps.len())
        .map(|index| match (timestamps[index], timestamps.get(index + 1)) {
            (_, None) => end_buffer_ms,
            (Some(current), Some(Some(next))) => next - current,
            _ => fallback_ms,
        })
        .collect()
}
