use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LyrixError, Result};

/// Delay held after the last line before the timer stops scheduling.
pub const DEFAULT_END_BUFFER_MS: i64 = 10_000;
/// Delay held after the last word of a line in single-item mode.
pub const DEFAULT_WORD_END_BUFFER_MS: i64 = 200;
/// Cadence used for plain (untimed) lyrics when auto-advance is enabled.
pub const DEFAULT_PLAIN_DELAY_MS: i64 = 1_000;
/// Fraction of the viewport read before auto-scroll kicks in.
pub const DEFAULT_READ_SCROLL_RATIO: f64 = 1.0;

/// Options recognised by [`crate::LyricsEngine`].
///
/// Every field has a default so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Index of the line (or word, in single-item mode) highlighted first.
    pub start_index: usize,
    /// Timestamps in seconds that replace the ones found in the lyrics.
    pub timestamps: Option<Vec<f64>>,
    pub end_buffer_ms: i64,
    pub word_end_buffer_ms: i64,
    /// Fraction of the viewport height read before auto-scrolling.
    pub read_scroll_ratio: f64,
    /// Ignores line selection and keyboard input. Host play/pause still works.
    pub disable_interactivity: bool,
    /// Shows one line at a time and progresses word by word.
    pub single_item_mode: bool,
    pub auto_advance_plain: bool,
    pub plain_delay_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            timestamps: None,
            end_buffer_ms: DEFAULT_END_BUFFER_MS,
            word_end_buffer_ms: DEFAULT_WORD_END_BUFFER_MS,
            read_scroll_ratio: DEFAULT_READ_SCROLL_RATIO,
            disable_interactivity: false,
            single_item_mode: false,
            auto_advance_plain: false,
            plain_delay_ms: DEFAULT_PLAIN_DELAY_MS,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let ratio = self.read_scroll_ratio;
        if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
            return Err(LyrixError::invalid_config(format!(
                "read_scroll_ratio must be within (0, 1], got {ratio}"
            )));
        }

        if let Some(timestamps) = &self.timestamps {
            if let Some(bad) = timestamps.iter().find(|t| !t.is_finite()) {
                return Err(LyrixError::invalid_config(format!(
                    "timestamp override `{bad}` is not a finite number of seconds"
                )));
            }
        }

        Ok(())
    }

    /// Timestamp overrides converted to whole milliseconds.
    pub fn timestamp_overrides_ms(&self) -> Option<Vec<i64>> {
        self.timestamps
            .as_ref()
            .map(|seconds| seconds.iter().map(|s| seconds_to_ms(*s)).collect())
    }
}

fn seconds_to_ms(seconds: f64) -> i64 {
    if seconds.is_finite() {
        (seconds * 1000.0).round() as i64
    } else {
        0
    }
}
