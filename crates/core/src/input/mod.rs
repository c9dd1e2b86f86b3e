use serde::{Deserialize, Serialize};

use crate::scroll::ScrollDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Space,
    Enter,
    Other(char),
}

/// Keyboard event as delivered by the host's input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub key: Key,
    pub shift: bool,
    /// Auto-repeat from a held key.
    pub repeat: bool,
}

impl KeyInput {
    pub fn pressed(key: Key) -> Self {
        Self {
            key,
            shift: false,
            repeat: false,
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePlayback,
    /// One viewport height, animated.
    ScrollPage(ScrollDirection),
    /// Short instant step while the key is held.
    ScrollNudge(ScrollDirection),
}

/// Maps a key to an engine action.
///
/// Space toggles playback. Enter pages down and Shift+Enter pages up; held
/// Enter nudges instead. Scrolling keys do nothing in single-item mode.
pub fn map_key(input: KeyInput, single_item_mode: bool) -> Option<KeyAction> {
    match input.key {
        Key::Space => Some(KeyAction::TogglePlayback),
        Key::Enter if single_item_mode => None,
        Key::Enter => {
            let direction = if input.shift {
                ScrollDirection::Up
            } else {
                ScrollDirection::Down
            };
            if input.repeat {
                Some(KeyAction::ScrollNudge(direction))
            } else {
                Some(KeyAction::ScrollPage(direction))
            }
        }
        Key::Other(' ') => Some(KeyAction::TogglePlayback),
        Key::Other(_) => None,
    }
}
