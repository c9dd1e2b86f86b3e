//! Async event loop around [`LyricsEngine`].
//!
//! The driver waits for whichever comes first, the timer deadline or a
//! command from the host, applies it, then flushes the queued notifications
//! to the host before waiting again. Everything runs on the driver's task,
//! one event at a time.

use std::future;
use std::time::Instant as StdInstant;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::input::KeyInput;
use crate::sync::LyricsHost;
use crate::{LyricsEngine, LyrixError, Result};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
    Toggle,
    SelectLine(i64),
    /// Single-item mode only.
    ShowLine(i64),
    Key(KeyInput),
    /// Replaces the lyrics text.
    Load(String),
    Shutdown,
}

/// Sending side used by the host to control a running [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
}

impl DriverHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LyrixError::msg("lyrics driver has stopped"))
    }

    pub async fn play(&self) -> Result<()> {
        self.send(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn select_line(&self, index: i64) -> Result<()> {
        self.send(Command::SelectLine(index)).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

#[derive(Debug)]
pub struct Driver {
    engine: LyricsEngine,
    commands: mpsc::Receiver<Command>,
}

impl Driver {
    pub fn new(engine: LyricsEngine) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        (
            Self {
                engine,
                commands: rx,
            },
            DriverHandle { commands: tx },
        )
    }

    /// Runs until [`Command::Shutdown`] arrives or every handle is dropped,
    /// then hands the engine back.
    pub async fn run<H: LyricsHost + ?Sized>(mut self, host: &mut H) -> LyricsEngine {
        tracing::debug!("lyrics driver started");

        loop {
            self.engine.flush(host, now());

            let deadline = self.engine.next_deadline();
            tokio::select! {
                _ = wait_until(deadline) => {
                    self.engine.poll_timer(now());
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
            }
        }

        self.engine.flush(host, now());
        tracing::debug!("lyrics driver stopped");
        self.engine
    }

    fn apply(&mut self, command: Command) {
        let now = now();
        tracing::trace!(?command, "driver command");
        match command {
            Command::Play => self.engine.play(now),
            Command::Pause => self.engine.pause(now),
            Command::Toggle => self.engine.toggle(now),
            Command::SelectLine(index) => {
                self.engine.select_line(index, now);
            }
            Command::ShowLine(line) => {
                if !self.engine.show_line(line) {
                    tracing::warn!(line, "show_line requires single-item mode");
                }
            }
            Command::Key(input) => {
                self.engine.handle_key(input, None, now);
            }
            Command::Load(text) => self.engine.load(&text),
            Command::Shutdown => {}
        }
    }
}

/// Current time on the tokio clock, so paused test clocks are honoured.
fn now() -> StdInstant {
    Instant::now().into_std()
}

async fn wait_until(deadline: Option<StdInstant>) {
    match deadline {
        Some(deadline) => time::sleep_until(Instant::from_std(deadline)).await,
        None => future::pending().await,
    }
}
