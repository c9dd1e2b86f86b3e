//! Core library for the Lyrix synchronized lyrics engine.
//!
//! Lyrics flow through the crate in one direction: [`lrc`] turns text into
//! timed lines or words, [`timeline`] derives the delay schedule,
//! [`timer`] counts it down, and [`sync`] turns timer expiries, host
//! requests and user selection into a single active index plus host
//! notifications. [`scroll`] decides how a view follows the active line and
//! [`engine`] ties the pieces together. [`driver`] runs an engine on a tokio
//! task for hosts that do not have their own event loop.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod input;
pub mod lrc;
pub mod scroll;
pub mod sync;
pub mod timeline;
pub mod timer;

pub use config::EngineConfig;
pub use driver::{Command, Driver, DriverHandle};
pub use engine::{Granularity, LyricsEngine};
pub use error::{LyrixError, Result};
pub use input::{Key, KeyAction, KeyInput};
pub use lrc::{TimedLine, TimedWord};
pub use scroll::{ItemBounds, ScrollBehavior, ScrollCommand, ScrollPolicy, Viewport};
pub use sync::{
    LyricsHost, Mode, Notification, PlaybackState, Request, Requests, SyncController, SyncEvent,
};
pub use timeline::{derive_delays, LineStatus, Timeline, TimelineItem};
pub use timer::ProgressionTimer;
