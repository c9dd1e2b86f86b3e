use std::time::Instant;

use crate::config::EngineConfig;
use crate::input::{map_key, KeyAction, KeyInput};
use crate::lrc::{self, TimedLine};
use crate::scroll::{ItemBounds, ScrollCommand, ScrollPolicy, Viewport};
use crate::sync::{ControllerOptions, LyricsHost, Notification, PlaybackState, SyncController};
use crate::timeline::{Timeline, TimelineItem};
use crate::Result;

/// What the engine's index currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Lines,
    /// Single-item mode: indices address the words of `line`.
    Words { line: usize },
}

/// Lyrics synchronization engine: parsed lyrics, the controller driving the
/// active item, and the scroll policy for the view.
///
/// In single-item mode the engine shows one line at a time and the
/// controller walks the words of that line instead of the lines of the song.
#[derive(Debug)]
pub struct LyricsEngine {
    config: EngineConfig,
    lines: Vec<TimedLine>,
    granularity: Granularity,
    controller: SyncController,
    scroll: ScrollPolicy,
    last_scrolled: Option<usize>,
}

impl LyricsEngine {
    pub fn new(text: &str, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let lines = lrc::parse_lines(text);
        let granularity = initial_granularity(&lines, &config);
        let timeline = build_timeline(&lines, &config, granularity);
        let options = ControllerOptions {
            start_index: match granularity {
                Granularity::Lines => config.start_index,
                Granularity::Words { .. } => 0,
            },
            auto_advance: auto_advance(&timeline, &config),
            interactive: !config.disable_interactivity,
        };

        tracing::debug!(
            lines = lines.len(),
            timed = timeline.is_timed(),
            ?granularity,
            "lyrics engine created"
        );

        Ok(Self {
            scroll: ScrollPolicy::new(config.read_scroll_ratio),
            controller: SyncController::new(timeline, options),
            config,
            lines,
            granularity,
            last_scrolled: None,
        })
    }

    /// Replaces the lyrics. Playback pauses and restarts from `start_index`.
    pub fn load(&mut self, text: &str) {
        self.lines = lrc::parse_lines(text);
        self.granularity = initial_granularity(&self.lines, &self.config);
        self.rebuild();
    }

    /// Single-item mode: shows `line` and rewinds to its first word.
    /// Returns `false` in line mode, where [`select_line`](Self::select_line)
    /// is the way to move.
    pub fn show_line(&mut self, line: i64) -> bool {
        if !self.config.single_item_mode {
            return false;
        }
        let line = clamp(line, self.lines.len());
        self.granularity = Granularity::Words { line };
        self.rebuild();
        true
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lines(&self) -> &[TimedLine] {
        &self.lines
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Items the controller is walking: lines, or words in single-item mode.
    pub fn timeline(&self) -> &Timeline {
        self.controller.timeline()
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn current_index(&self) -> usize {
        self.controller.current_index()
    }

    pub fn current_item(&self) -> Option<&TimelineItem> {
        self.timeline().item(self.current_index())
    }

    pub fn is_playing(&self) -> bool {
        self.controller.is_playing()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.controller.next_deadline()
    }

    pub fn play(&mut self, now: Instant) {
        self.controller.play(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.controller.pause(now);
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.is_playing() {
            self.pause(now);
        } else {
            self.play(now);
        }
    }

    /// User click on an item. Returns `false` when interactivity is disabled.
    pub fn select_line(&mut self, index: i64, now: Instant) -> bool {
        self.controller.select_line(index, now)
    }

    pub fn poll_timer(&mut self, now: Instant) -> usize {
        self.controller.poll_timer(now)
    }

    pub fn flush<H: LyricsHost + ?Sized>(&mut self, host: &mut H, now: Instant) -> usize {
        self.controller.flush(host, now)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.controller.take_notifications()
    }

    /// Applies a key press. Scroll keys need the current `viewport` and
    /// return the command for the renderer.
    pub fn handle_key(
        &mut self,
        input: KeyInput,
        viewport: Option<Viewport>,
        now: Instant,
    ) -> Option<ScrollCommand> {
        if self.config.disable_interactivity {
            return None;
        }

        match map_key(input, self.config.single_item_mode)? {
            KeyAction::TogglePlayback => {
                self.toggle(now);
                None
            }
            KeyAction::ScrollPage(direction) => viewport.map(|v| self.scroll.page(v, direction)),
            KeyAction::ScrollNudge(direction) => viewport.map(|v| self.scroll.nudge(v, direction)),
        }
    }

    /// Auto-scroll decision for the current geometry. Only the first call
    /// after an index change can scroll, and single-item mode never does.
    pub fn scroll_for(
        &mut self,
        viewport: Viewport,
        current: ItemBounds,
        next: Option<ItemBounds>,
    ) -> Option<ScrollCommand> {
        if self.config.single_item_mode {
            return None;
        }

        let index = self.current_index();
        if self.last_scrolled == Some(index) {
            return None;
        }
        self.last_scrolled = Some(index);

        let command = self.scroll.decide(viewport, current, next);
        if let Some(command) = command {
            tracing::trace!(index, top = command.top, "auto-scroll");
        }
        command
    }

    fn rebuild(&mut self) {
        let timeline = build_timeline(&self.lines, &self.config, self.granularity);
        let start_index = match self.granularity {
            Granularity::Lines => self.config.start_index,
            Granularity::Words { .. } => 0,
        };
        let auto_advance = auto_advance(&timeline, &self.config);
        let interactive = !self.config.disable_interactivity;

        self.controller.rebuild(timeline, start_index);
        self.controller.set_interactive(interactive);
        self.controller.set_auto_advance(auto_advance);
        self.last_scrolled = None;
    }
}

fn initial_granularity(lines: &[TimedLine], config: &EngineConfig) -> Granularity {
    if config.single_item_mode {
        Granularity::Words {
            line: clamp(config.start_index as i64, lines.len()),
        }
    } else {
        Granularity::Lines
    }
}

fn build_timeline(lines: &[TimedLine], config: &EngineConfig, granularity: Granularity) -> Timeline {
    match granularity {
        Granularity::Lines => {
            let timeline = Timeline::from_lines(lines, config.end_buffer_ms)
                .with_fallback_delay(config.plain_delay_ms);
            match config.timestamp_overrides_ms() {
                Some(overrides) => timeline.with_timestamps(&overrides),
                None => timeline,
            }
        }
        Granularity::Words { line } => {
            let Some(line) = lines.get(line) else {
                return Timeline::default();
            };
            let words = lrc::parse_words(&line.source);
            if words.is_empty() {
                Timeline::new(
                    vec![TimelineItem {
                        text: line.text.clone(),
                        timestamp_ms: line.timestamp_ms,
                    }],
                    config.word_end_buffer_ms,
                )
            } else {
                Timeline::from_words(&words, config.word_end_buffer_ms)
            }
        }
    }
}

fn auto_advance(timeline: &Timeline, config: &EngineConfig) -> bool {
    timeline.has_timestamps() || config.auto_advance_plain
}

fn clamp(index: i64, len: usize) -> usize {
    index.clamp(0, len.saturating_sub(1) as i64) as usize
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::input::Key;
    use crate::scroll::ScrollBehavior;

    const SONG: &str = "[00:00.00]This is [00:01.00]a line\n\
                        [00:02.00]Second [00:02.50]line [00:03.00]here\n\
                        [00:04.00]Third line";

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn engine(config: EngineConfig) -> LyricsEngine {
        let mut engine = LyricsEngine::new(SONG, config).unwrap();
        engine.take_notifications();
        engine
    }

    #[test]
    fn strips_inline_tags_in_line_mode() {
        let engine = engine(EngineConfig::default());
        let texts: Vec<_> = engine.timeline().items().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, ["This is a line", "Second line here", "Third line"]);
        assert_eq!(engine.timeline().delays(), &[2_000, 2_000, 10_000]);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            read_scroll_ratio: 2.0,
            ..Default::default()
        };
        assert!(LyricsEngine::new(SONG, config).is_err());
    }

    #[test]
    fn timestamp_overrides_take_precedence() {
        let engine = engine(EngineConfig {
            timestamps: Some(vec![0.0, 0.5, 0.75]),
            end_buffer_ms: 300,
            ..Default::default()
        });
        assert_eq!(engine.timeline().delays(), &[500, 250, 300]);
        assert_eq!(engine.timeline().time_seconds(1), Some(0.5));
    }

    #[test]
    fn single_item_mode_walks_words_of_one_line() {
        let t0 = Instant::now();
        let mut engine = engine(EngineConfig {
            single_item_mode: true,
            start_index: 1,
            ..Default::default()
        });

        assert_eq!(engine.granularity(), Granularity::Words { line: 1 });
        let words: Vec<_> = engine.timeline().items().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(words, ["Second ", "line ", "here"]);
        assert_eq!(engine.timeline().delays(), &[500, 500, 200]);

        engine.play(t0);
        engine.poll_timer(t0 + ms(1_000));
        assert_eq!(engine.current_index(), 2);
        assert_eq!(engine.current_item().map(|i| i.text.as_str()), Some("here"));
    }

    #[test]
    fn show_line_switches_words_and_pauses() {
        let t0 = Instant::now();
        let mut engine = engine(EngineConfig {
            single_item_mode: true,
            ..Default::default()
        });
        engine.play(t0);
        engine.take_notifications();

        assert!(engine.show_line(2));
        assert!(!engine.is_playing());
        assert_eq!(engine.granularity(), Granularity::Words { line: 2 });
        assert_eq!(engine.timeline().len(), 1);
        assert_eq!(engine.current_item().map(|i| i.text.as_str()), Some("Third line"));
        assert_eq!(
            engine.take_notifications(),
            vec![
                Notification::Pause,
                Notification::LineChange { index: 0, time: Some(4.0) }
            ]
        );
    }

    #[test]
    fn show_line_is_rejected_in_line_mode() {
        let mut engine = engine(EngineConfig::default());
        assert!(!engine.show_line(1));
    }

    #[test]
    fn space_toggles_and_enter_scrolls() {
        let now = Instant::now();
        let mut engine = engine(EngineConfig::default());
        let viewport = Viewport {
            top: 0.0,
            height: 50.0,
            scroll_top: 0.0,
        };

        assert_eq!(engine.handle_key(KeyInput::pressed(Key::Space), None, now), None);
        assert!(engine.is_playing());

        let command = engine.handle_key(KeyInput::pressed(Key::Enter), Some(viewport), now);
        assert_eq!(
            command,
            Some(ScrollCommand {
                top: 50.0,
                behavior: ScrollBehavior::Smooth
            })
        );
    }

    #[test]
    fn disabled_interactivity_ignores_keys_and_clicks() {
        let now = Instant::now();
        let mut engine = engine(EngineConfig {
            disable_interactivity: true,
            ..Default::default()
        });

        assert_eq!(engine.handle_key(KeyInput::pressed(Key::Space), None, now), None);
        assert!(!engine.is_playing());
        assert!(!engine.select_line(2, now));
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn auto_scroll_runs_once_per_index_change() {
        let t0 = Instant::now();
        let mut engine = engine(EngineConfig::default());
        let viewport = Viewport {
            top: 0.0,
            height: 100.0,
            scroll_top: 0.0,
        };
        let current = ItemBounds { top: 85.0, bottom: 95.0 };
        let next = Some(ItemBounds { top: 95.0, bottom: 110.0 });

        assert!(engine.scroll_for(viewport, current, next).is_some());
        assert!(engine.scroll_for(viewport, current, next).is_none());

        engine.play(t0);
        engine.poll_timer(t0 + ms(2_000));
        assert!(engine.scroll_for(viewport, current, next).is_some());
    }

    #[test]
    fn single_item_mode_never_auto_scrolls() {
        let mut engine = engine(EngineConfig {
            single_item_mode: true,
            ..Default::default()
        });
        let viewport = Viewport {
            top: 0.0,
            height: 100.0,
            scroll_top: 0.0,
        };
        let current = ItemBounds { top: 70.0, bottom: 78.0 };

        assert!(engine
            .scroll_for(viewport, current, Some(ItemBounds { top: 78.0, bottom: 95.0 }))
            .is_none());
    }

    #[test]
    fn plain_lyrics_advance_only_when_configured() {
        let t0 = Instant::now();
        let mut still = LyricsEngine::new("a\nb\nc", EngineConfig::default()).unwrap();
        still.play(t0);
        still.poll_timer(t0 + ms(10_000));
        assert_eq!(still.current_index(), 0);

        let mut cadence = LyricsEngine::new(
            "a\nb\nc",
            EngineConfig {
                auto_advance_plain: true,
                plain_delay_ms: 500,
                ..Default::default()
            },
        )
        .unwrap();
        cadence.play(t0);
        cadence.poll_timer(t0 + ms(1_000));
        assert_eq!(cadence.current_index(), 2);
    }

    #[test]
    fn short_timestamp_override_still_advances() {
        let t0 = Instant::now();
        let mut engine = LyricsEngine::new(
            "a\nb\nc",
            EngineConfig {
                timestamps: Some(vec![0.0, 1.0]),
                plain_delay_ms: 750,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(engine.timeline().delays(), &[1_000, 750, 10_000]);

        engine.play(t0);
        assert_eq!(engine.next_deadline(), Some(t0 + ms(1_000)));
        engine.poll_timer(t0 + ms(1_000));
        assert_eq!(engine.current_index(), 1);
        engine.poll_timer(t0 + ms(1_750));
        assert_eq!(engine.current_index(), 2);
    }

    #[test]
    fn load_replaces_lyrics() {
        let mut engine = engine(EngineConfig::default());
        engine.load("[00:00.00]new\n[00:01.00]song");
        assert_eq!(engine.lines().len(), 2);
        assert_eq!(engine.timeline().len(), 2);
        assert_eq!(engine.current_index(), 0);
    }
}
