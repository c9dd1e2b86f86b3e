//! Parser for the LRC timestamped lyrics format.
//!
//! A tag has the shape `[MM:SS.ff]` with two-digit minutes and seconds and a
//! two- or three-digit fraction. A two-digit fraction counts centiseconds and
//! a three-digit fraction counts milliseconds, so `[00:01.50]` and
//! `[00:01.500]` both resolve to 1500 ms. Anything that does not match the
//! grammar exactly is treated as ordinary text; parsing never fails.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d{2}):(\d{2})\.(\d{2,3})\]").expect("LRC tag pattern is valid")
});

/// A single line of lyrics with the time at which it becomes active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedLine {
    /// Display text with every tag removed and surrounding whitespace trimmed.
    pub text: String,
    /// `None` for plain (untimed) lyrics.
    pub timestamp_ms: Option<i64>,
    /// The untouched source line, inline word tags included.
    #[serde(skip)]
    pub source: String,
}

/// A fragment of a single line with the time at which it is sung.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedWord {
    pub text: String,
    pub timestamp_ms: i64,
}

/// Returns `true` when any line of `text` carries a well-formed tag.
pub fn is_lrc(text: &str) -> bool {
    TAG_PATTERN.is_match(text)
}

/// Parses a single tag such as `[01:02.345]` into milliseconds.
pub fn parse_timestamp(tag: &str) -> Option<i64> {
    let caps = TAG_PATTERN.captures(tag.trim())?;
    let whole = caps.get(0)?;
    if whole.as_str().len() != tag.trim().len() {
        return None;
    }
    Some(tag_millis(&caps))
}

/// Renders milliseconds as a `[MM:SS.ff]` tag. Negative values clamp to zero.
pub fn format_timestamp(ms: i64) -> String {
    let ms = ms.max(0);
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let centis = (ms % 1_000) / 10;
    format!("[{minutes:02}:{seconds:02}.{centis:02}]")
}

/// Splits full lyrics into lines.
///
/// When at least one line carries a tag the input is treated as LRC: lines
/// without a tag are dropped and each kept line takes the timestamp of its
/// first tag. Otherwise every line is kept as plain, untimed text. An empty
/// input still produces a single empty line.
pub fn parse_lines(text: &str) -> Vec<TimedLine> {
    let raw_lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

    if !is_lrc(text) {
        return raw_lines
            .map(|line| TimedLine {
                text: line.trim().to_string(),
                timestamp_ms: None,
                source: line.to_string(),
            })
            .collect();
    }

    raw_lines
        .filter_map(|line| {
            let first = TAG_PATTERN.captures(line)?;
            Some(TimedLine {
                text: strip_tags(line),
                timestamp_ms: Some(tag_millis(&first)),
                source: line.to_string(),
            })
        })
        .collect()
}

/// Splits a single line with inline tags into timed fragments.
///
/// `[00:00.00]This is [00:01.00]a line` yields `"This is "` at 0 ms and
/// `"a line"` at 1000 ms. Fragments keep their inner whitespace. A tag with
/// no text before the next tag is dropped along with its timestamp, and text
/// preceding the first tag is ignored.
pub fn parse_words(line: &str) -> Vec<TimedWord> {
    let tags: Vec<_> = TAG_PATTERN.captures_iter(line).collect();

    tags.iter()
        .enumerate()
        .filter_map(|(index, caps)| {
            let whole = caps.get(0)?;
            let end = tags
                .get(index + 1)
                .and_then(|next| next.get(0))
                .map(|next| next.start())
                .unwrap_or(line.len());
            let fragment = &line[whole.end()..end];
            if fragment.trim().is_empty() {
                return None;
            }
            Some(TimedWord {
                text: fragment.to_string(),
                timestamp_ms: tag_millis(caps),
            })
        })
        .collect()
}

/// Removes every tag from `line` and trims the remainder.
pub fn strip_tags(line: &str) -> String {
    TAG_PATTERN.replace_all(line, "").trim().to_string()
}

fn tag_millis(caps: &Captures<'_>) -> i64 {
    let field = |index: usize| -> i64 {
        caps.get(index)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let fraction_digits = caps.get(3).map(|m| m.as_str().len()).unwrap_or(2);
    let fraction = match fraction_digits {
        2 => field(3) * 10,
        _ => field(3),
    };

    field(1) * 60_000 + field(2) * 1_000 + fraction
}
