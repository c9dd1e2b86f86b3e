//! Viewport scrolling decisions.
//!
//! The policy only sees geometry in abstract units (pixels, terminal rows)
//! and returns the scroll offset the renderer should move to.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_READ_SCROLL_RATIO;

/// Distance moved per held-key repeat.
pub const NUDGE_DISTANCE: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Visible region of the scroll container, in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub top: f64,
    pub height: f64,
    /// Current scroll offset of the content.
    pub scroll_top: f64,
}

/// Rendered vertical extent of one item, in the same coordinates as
/// [`Viewport::top`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemBounds {
    pub top: f64,
    pub bottom: f64,
}

/// Absolute scroll offset to move the content to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollCommand {
    pub top: f64,
    pub behavior: ScrollBehavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Keeps the active item inside the comfortable reading band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPolicy {
    read_scroll_ratio: f64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            read_scroll_ratio: DEFAULT_READ_SCROLL_RATIO,
        }
    }
}

impl ScrollPolicy {
    /// Ratios outside `(0, 1]` fall back to the default.
    pub fn new(read_scroll_ratio: f64) -> Self {
        if read_scroll_ratio.is_finite() && read_scroll_ratio > 0.0 && read_scroll_ratio <= 1.0 {
            Self { read_scroll_ratio }
        } else {
            tracing::warn!(read_scroll_ratio, "read ratio out of range, using default");
            Self::default()
        }
    }

    pub fn read_scroll_ratio(&self) -> f64 {
        self.read_scroll_ratio
    }

    /// Scrolls when the next item would end below the reading band, or when
    /// the current item ends above its upper edge. The current item is then
    /// placed `(1 - ratio) * height` below the viewport top. Without a next
    /// item nothing moves.
    pub fn decide(
        &self,
        viewport: Viewport,
        current: ItemBounds,
        next: Option<ItemBounds>,
    ) -> Option<ScrollCommand> {
        let next = next?;
        let ratio = self.read_scroll_ratio;
        let band_bottom = viewport.top + ratio * viewport.height;
        let band_top = viewport.top + (1.0 - ratio) * viewport.height;

        if next.bottom > band_bottom || current.bottom < band_top {
            Some(ScrollCommand {
                top: viewport.scroll_top + (current.top - viewport.top)
                    - (1.0 - ratio) * viewport.height,
                behavior: ScrollBehavior::Smooth,
            })
        } else {
            None
        }
    }

    /// Moves by one viewport height.
    pub fn page(&self, viewport: Viewport, direction: ScrollDirection) -> ScrollCommand {
        ScrollCommand {
            top: viewport.scroll_top + signed(direction, viewport.height),
            behavior: ScrollBehavior::Smooth,
        }
    }

    /// Moves by [`NUDGE_DISTANCE`] without animation, for held keys.
    pub fn nudge(&self, viewport: Viewport, direction: ScrollDirection) -> ScrollCommand {
        ScrollCommand {
            top: viewport.scroll_top + signed(direction, NUDGE_DISTANCE),
            behavior: ScrollBehavior::Instant,
        }
    }
}

fn signed(direction: ScrollDirection, distance: f64) -> f64 {
    match direction {
        ScrollDirection::Up => -distance,
        ScrollDirection::Down => distance,
    }
}
