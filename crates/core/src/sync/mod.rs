//! Synchronization state machine.
//!
//! [`SyncController`] owns the active index and the running/paused mode. It
//! reconciles four event sources (host play, host pause, user line
//! selection and timer expiry) and records the resulting host notifications
//! in a queue. Nothing is delivered while a transition is being applied; the
//! host receives notifications only when it pumps [`SyncController::flush`]
//! (or drains them with [`SyncController::take_notifications`]), after the
//! state change is committed.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::timeline::Timeline;
use crate::timer::ProgressionTimer;

/// Upper bound on flush rounds when host callbacks keep issuing requests.
const MAX_FLUSH_ROUNDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Running,
    Paused,
}

/// Mode most recently asked for by the host through play/pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalMode {
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_index: usize,
    pub mode: Mode,
    /// `None` until the host issues its first play or pause.
    pub requested_external_mode: Option<ExternalMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    ExternalPlay,
    ExternalPause,
    /// Selection of an item by the user. Out-of-range values are clamped.
    UserSelectLine(i64),
    TimerAdvance,
}

/// Host-facing notification. Times are in seconds; `None` when the item has
/// no timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    Play { time: Option<f64> },
    Pause,
    UserLineChange { index: usize, time: Option<f64> },
    LineChange { index: usize, time: Option<f64> },
}

impl Notification {
    /// Time in seconds with `-1.0` standing in for "untimed".
    pub fn host_time(&self) -> f64 {
        match self {
            Notification::Play { time }
            | Notification::UserLineChange { time, .. }
            | Notification::LineChange { time, .. } => time.unwrap_or(-1.0),
            Notification::Pause => -1.0,
        }
    }

    fn deliver<H: LyricsHost + ?Sized>(self, host: &mut H, requests: &mut Requests) {
        match self {
            Notification::Play { time } => host.on_play(time, requests),
            Notification::Pause => host.on_pause(requests),
            Notification::UserLineChange { index, time } => {
                host.on_user_line_change(index, time, requests)
            }
            Notification::LineChange { index, time } => host.on_line_change(index, time, requests),
        }
    }
}

/// Control request a host callback may issue while it is being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Play,
    Pause,
    SelectLine(i64),
}

/// Requests collected during a flush and applied once the callbacks return.
#[derive(Debug, Default)]
pub struct Requests {
    queued: Vec<Request>,
}

impl Requests {
    pub fn play(&mut self) {
        self.queued.push(Request::Play);
    }

    pub fn pause(&mut self) {
        self.queued.push(Request::Pause);
    }

    pub fn select_line(&mut self, index: i64) {
        self.queued.push(Request::SelectLine(index));
    }
}

/// Callback surface implemented by the host. Every method defaults to a
/// no-op, so a host only overrides what it listens to.
pub trait LyricsHost {
    fn on_play(&mut self, _time: Option<f64>, _requests: &mut Requests) {}

    fn on_pause(&mut self, _requests: &mut Requests) {}

    fn on_user_line_change(&mut self, _index: usize, _time: Option<f64>, _requests: &mut Requests) {}

    fn on_line_change(&mut self, _index: usize, _time: Option<f64>, _requests: &mut Requests) {}
}

/// Collects every notification in order.
impl LyricsHost for Vec<Notification> {
    fn on_play(&mut self, time: Option<f64>, _requests: &mut Requests) {
        self.push(Notification::Play { time });
    }

    fn on_pause(&mut self, _requests: &mut Requests) {
        self.push(Notification::Pause);
    }

    fn on_user_line_change(&mut self, index: usize, time: Option<f64>, _requests: &mut Requests) {
        self.push(Notification::UserLineChange { index, time });
    }

    fn on_line_change(&mut self, index: usize, time: Option<f64>, _requests: &mut Requests) {
        self.push(Notification::LineChange { index, time });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub start_index: usize,
    /// Arms the timer on play. Without it, play only flips the mode.
    pub auto_advance: bool,
    /// Accepts user line selection.
    pub interactive: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            start_index: 0,
            auto_advance: true,
            interactive: true,
        }
    }
}

#[derive(Debug)]
pub struct SyncController {
    timeline: Timeline,
    state: PlaybackState,
    timer: ProgressionTimer,
    options: ControllerOptions,
    pending: VecDeque<Notification>,
}

impl SyncController {
    /// Creates a paused controller positioned on `options.start_index`. The
    /// initial index is announced with one queued `LineChange`.
    pub fn new(timeline: Timeline, options: ControllerOptions) -> Self {
        let current_index = timeline.clamp_index(options.start_index as i64);
        let timer = ProgressionTimer::new(timeline.delays().to_vec());
        let mut controller = Self {
            timeline,
            state: PlaybackState {
                current_index,
                mode: Mode::Paused,
                requested_external_mode: None,
            },
            timer,
            options,
            pending: VecDeque::new(),
        };
        controller.queue_line_change();
        controller
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.state.mode == Mode::Running
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.options.interactive = interactive;
    }

    /// Takes effect on the next play.
    pub fn set_auto_advance(&mut self, auto_advance: bool) {
        self.options.auto_advance = auto_advance;
    }

    /// When the timer next needs to be polled, if at all.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.next_deadline()
    }

    /// Replaces the timeline with freshly built lyrics. Playback pauses and
    /// the new `start_index` is announced.
    pub fn rebuild(&mut self, timeline: Timeline, start_index: usize) {
        if self.is_playing() {
            self.state.mode = Mode::Paused;
            self.pending.push_back(Notification::Pause);
        }
        self.timer.reset(timeline.delays().to_vec());
        self.timeline = timeline;
        self.state.current_index = self.timeline.clamp_index(start_index as i64);
        tracing::debug!(
            items = self.timeline.len(),
            index = self.state.current_index,
            "timeline rebuilt"
        );
        self.queue_line_change();
    }

    pub fn play(&mut self, now: Instant) {
        self.handle(SyncEvent::ExternalPlay, now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.handle(SyncEvent::ExternalPause, now);
    }

    /// User selection of `index`. Returns `false` when interactivity is off.
    pub fn select_line(&mut self, index: i64, now: Instant) -> bool {
        if !self.options.interactive {
            tracing::debug!(index, "line selection ignored, interactivity disabled");
            return false;
        }
        self.handle(SyncEvent::UserSelectLine(index), now);
        true
    }

    /// Applies every timer expiry due at `now`. Returns the number handled.
    pub fn poll_timer(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while self.timer.poll(now).is_some() {
            self.advance();
            fired += 1;
        }
        fired
    }

    /// Applies a single event. Notifications are queued, never delivered here.
    pub fn handle(&mut self, event: SyncEvent, now: Instant) {
        match event {
            SyncEvent::ExternalPlay => {
                self.state.requested_external_mode = Some(ExternalMode::Playing);
                self.enter_running(now);
            }
            SyncEvent::ExternalPause => {
                self.state.requested_external_mode = Some(ExternalMode::Paused);
                self.enter_paused();
            }
            SyncEvent::UserSelectLine(requested) => {
                let index = self.timeline.clamp_index(requested);
                if index as i64 != requested {
                    tracing::warn!(requested, index, "line selection clamped");
                }
                self.select(index, now);
            }
            SyncEvent::TimerAdvance => {
                // Raised outside the timer, so its schedule restarts here.
                if self.advance() && self.options.auto_advance {
                    self.timer.start(self.state.current_index, now);
                }
            }
        }
    }

    /// Removes and returns every queued notification.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.pending.drain(..).collect()
    }

    pub fn has_pending_notifications(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Delivers queued notifications to `host`. Requests the host issues from
    /// its callbacks are applied after the batch returns, and the
    /// notifications they cause are delivered in a following round.
    pub fn flush<H: LyricsHost + ?Sized>(&mut self, host: &mut H, now: Instant) -> usize {
        let mut delivered = 0;

        for _ in 0..MAX_FLUSH_ROUNDS {
            if self.pending.is_empty() {
                break;
            }

            let mut requests = Requests::default();
            for notification in self.take_notifications() {
                notification.deliver(host, &mut requests);
                delivered += 1;
            }

            for request in requests.queued {
                self.apply(request, now);
            }
        }

        if !self.pending.is_empty() {
            tracing::warn!(
                queued = self.pending.len(),
                "host callbacks kept issuing requests, deferring the rest"
            );
        }

        delivered
    }

    /// Applies a host request outside of a flush.
    pub fn apply(&mut self, request: Request, now: Instant) {
        match request {
            Request::Play => self.play(now),
            Request::Pause => self.pause(now),
            Request::SelectLine(index) => {
                self.select_line(index, now);
            }
        }
    }

    fn select(&mut self, index: usize, now: Instant) {
        if index == self.state.current_index {
            if self.is_playing() {
                self.enter_paused();
            } else {
                self.enter_running(now);
            }
            return;
        }

        self.timer.stop();
        self.state.mode = Mode::Paused;
        self.pending.push_back(Notification::Pause);

        self.state.current_index = index;
        tracing::debug!(index, "user jumped to line");
        self.pending.push_back(Notification::UserLineChange {
            index,
            time: self.timeline.time_seconds(index),
        });
        self.queue_line_change();
    }

    fn enter_running(&mut self, now: Instant) {
        if self.is_playing() {
            return;
        }

        self.state.mode = Mode::Running;
        if self.options.auto_advance {
            self.timer.start(self.state.current_index, now);
        }
        tracing::debug!(index = self.state.current_index, "playback running");
        self.pending.push_back(Notification::Play {
            time: self.timeline.time_seconds(self.state.current_index),
        });
    }

    fn enter_paused(&mut self) {
        if !self.is_playing() {
            return;
        }

        self.timer.stop();
        self.state.mode = Mode::Paused;
        tracing::debug!(index = self.state.current_index, "playback paused");
        self.pending.push_back(Notification::Pause);
    }

    /// Moves to the next item while running. Returns whether the index moved.
    fn advance(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }

        let next = (self.state.current_index + 1).min(self.timeline.last_index());
        if next == self.state.current_index {
            return false;
        }

        self.state.current_index = next;
        self.queue_line_change();
        true
    }

    fn queue_line_change(&mut self) {
        let index = self.state.current_index;
        self.pending.push_back(Notification::LineChange {
            index,
            time: self.timeline.time_seconds(index),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::lrc;

    const LYRICS: &str = "[00:00.00]zero\n[00:01.00]one\n[00:03.50]two\n[00:04.00]three\n\
                          [00:05.00]four\n[00:07.25]five\n[00:08.00]six";

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn controller(start_index: usize) -> SyncController {
        let timeline = Timeline::from_lines(&lrc::parse_lines(LYRICS), 1_000);
        let mut controller = SyncController::new(
            timeline,
            ControllerOptions {
                start_index,
                ..Default::default()
            },
        );
        controller.take_notifications();
        controller
    }

    fn count(notifications: &[Notification], predicate: impl Fn(&Notification) -> bool) -> usize {
        notifications.iter().filter(|n| predicate(*n)).count()
    }

    #[test]
    fn announces_start_index_on_creation() {
        let timeline = Timeline::from_lines(&lrc::parse_lines(LYRICS), 1_000);
        let mut controller = SyncController::new(
            timeline,
            ControllerOptions {
                start_index: 2,
                ..Default::default()
            },
        );

        assert_eq!(
            controller.take_notifications(),
            vec![Notification::LineChange {
                index: 2,
                time: Some(3.5)
            }]
        );
        assert!(!controller.is_playing());
    }

    #[test]
    fn play_twice_emits_single_play() {
        let now = Instant::now();
        let mut controller = controller(1);
        controller.play(now);
        controller.play(now);

        let notes = controller.take_notifications();
        assert_eq!(notes, vec![Notification::Play { time: Some(1.0) }]);
        assert!(controller.is_playing());
        assert_eq!(controller.state().requested_external_mode, Some(ExternalMode::Playing));
    }

    #[test]
    fn pause_is_idempotent() {
        let now = Instant::now();
        let mut controller = controller(0);
        controller.pause(now);
        assert!(controller.take_notifications().is_empty());

        controller.play(now);
        controller.pause(now);
        controller.pause(now);
        let notes = controller.take_notifications();
        assert_eq!(count(&notes, |n| matches!(n, Notification::Pause)), 1);
        assert!(!controller.is_playing());
        assert_eq!(controller.next_deadline(), None);
    }

    #[test]
    fn notifications_wait_for_flush() {
        let now = Instant::now();
        let mut controller = controller(0);
        let mut host: Vec<Notification> = Vec::new();

        controller.play(now);
        assert!(host.is_empty());
        assert!(controller.has_pending_notifications());

        assert_eq!(controller.flush(&mut host, now), 1);
        assert_eq!(host, vec![Notification::Play { time: Some(0.0) }]);
    }

    #[test]
    fn timer_advances_with_irregular_delays() {
        let t0 = Instant::now();
        let mut controller = controller(0);
        controller.play(t0);
        controller.take_notifications();

        assert_eq!(controller.poll_timer(t0 + ms(999)), 0);
        assert_eq!(controller.poll_timer(t0 + ms(1_000)), 1);
        assert_eq!(controller.current_index(), 1);
        assert_eq!(controller.poll_timer(t0 + ms(3_000)), 0);
        assert_eq!(controller.poll_timer(t0 + ms(3_500)), 1);

        assert_eq!(
            controller.take_notifications(),
            vec![
                Notification::LineChange { index: 1, time: Some(1.0) },
                Notification::LineChange { index: 2, time: Some(3.5) },
            ]
        );
    }

    #[test]
    fn reaching_last_line_emits_once_then_holds() {
        let t0 = Instant::now();
        let mut controller = controller(5);
        controller.play(t0);
        controller.take_notifications();

        controller.poll_timer(t0 + ms(750));
        assert_eq!(controller.current_index(), 6);
        assert_eq!(
            controller.take_notifications(),
            vec![Notification::LineChange { index: 6, time: Some(8.0) }]
        );

        // End buffer expires while already on the last line.
        assert_eq!(controller.poll_timer(t0 + ms(1_750)), 1);
        assert_eq!(controller.current_index(), 6);
        assert!(controller.take_notifications().is_empty());
        assert!(controller.is_playing());
    }

    #[test]
    fn advance_event_on_last_line_is_noop() {
        let now = Instant::now();
        let mut controller = controller(6);
        controller.play(now);
        controller.take_notifications();

        controller.handle(SyncEvent::TimerAdvance, now);
        assert_eq!(controller.current_index(), 6);
        assert!(controller.take_notifications().is_empty());
    }

    #[test]
    fn external_advance_realigns_timer_schedule() {
        let t0 = Instant::now();
        let mut controller = controller(0);
        controller.play(t0);
        controller.take_notifications();

        controller.handle(SyncEvent::TimerAdvance, t0);
        assert_eq!(controller.current_index(), 1);
        assert_eq!(controller.next_deadline(), Some(t0 + ms(2_500)));

        assert_eq!(controller.poll_timer(t0 + ms(1_000)), 0);
        assert_eq!(controller.current_index(), 1);
        assert_eq!(controller.poll_timer(t0 + ms(2_500)), 1);
        assert_eq!(controller.current_index(), 2);
    }

    #[test]
    fn jump_while_running_pauses_and_reports_user_change() {
        let t0 = Instant::now();
        let mut controller = controller(2);
        controller.play(t0);
        controller.take_notifications();

        controller.select_line(5, t0 + ms(200));
        let notes = controller.take_notifications();

        assert_eq!(count(&notes, |n| matches!(n, Notification::Pause)), 1);
        assert_eq!(
            count(&notes, |n| *n == Notification::UserLineChange { index: 5, time: Some(7.25) }),
            1
        );
        assert_eq!(count(&notes, |n| matches!(n, Notification::LineChange { index: 5, .. })), 1);
        assert_eq!(controller.current_index(), 5);
        assert_eq!(controller.state().mode, Mode::Paused);
        assert_eq!(controller.poll_timer(t0 + ms(60_000)), 0);
    }

    #[test]
    fn selecting_current_line_toggles_playback() {
        let now = Instant::now();
        let mut controller = controller(3);

        controller.select_line(3, now);
        assert!(controller.is_playing());
        controller.select_line(3, now);
        assert!(!controller.is_playing());

        assert_eq!(
            controller.take_notifications(),
            vec![Notification::Play { time: Some(4.0) }, Notification::Pause]
        );
    }

    #[test]
    fn out_of_range_selection_clamps() {
        let now = Instant::now();
        let mut controller = controller(0);

        controller.select_line(42, now);
        assert_eq!(controller.current_index(), 6);
        controller.select_line(-4, now);
        assert_eq!(controller.current_index(), 0);
    }

    #[test]
    fn disabled_interactivity_ignores_selection() {
        let now = Instant::now();
        let mut controller = controller(0);
        controller.set_interactive(false);

        assert!(!controller.select_line(4, now));
        assert_eq!(controller.current_index(), 0);
        assert!(controller.take_notifications().is_empty());

        controller.play(now);
        assert!(controller.is_playing());
    }

    #[test]
    fn resume_restarts_full_delay_of_current_line() {
        let t0 = Instant::now();
        let mut controller = controller(1);
        controller.play(t0);
        controller.pause(t0 + ms(2_000));

        let resumed = t0 + ms(10_000);
        controller.play(resumed);
        assert_eq!(controller.next_deadline(), Some(resumed + ms(2_500)));
    }

    #[test]
    fn plain_lyrics_do_not_advance_without_auto_advance() {
        let now = Instant::now();
        let timeline = Timeline::from_lines(&lrc::parse_lines("a\nb"), 1_000);
        let mut controller = SyncController::new(
            timeline,
            ControllerOptions {
                auto_advance: false,
                ..Default::default()
            },
        );
        controller.take_notifications();

        controller.play(now);
        assert!(controller.is_playing());
        assert_eq!(controller.next_deadline(), None);
        assert_eq!(
            controller.take_notifications(),
            vec![Notification::Play { time: None }]
        );

        controller.select_line(1, now);
        let notes = controller.take_notifications();
        assert!(notes.contains(&Notification::UserLineChange { index: 1, time: None }));
        assert_eq!(notes.last().map(Notification::host_time), Some(-1.0));
    }

    #[test]
    fn empty_lyrics_never_advance() {
        let now = Instant::now();
        let mut controller = SyncController::new(
            Timeline::from_lines(&lrc::parse_lines(""), 1_000),
            ControllerOptions::default(),
        );
        controller.take_notifications();
        controller.play(now);
        controller.poll_timer(now + ms(60_000));

        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.take_notifications(), vec![Notification::Play { time: None }]);
    }

    struct PauseOnPlay {
        seen: Vec<Notification>,
    }

    impl LyricsHost for PauseOnPlay {
        fn on_play(&mut self, time: Option<f64>, requests: &mut Requests) {
            self.seen.push(Notification::Play { time });
            requests.pause();
        }

        fn on_pause(&mut self, _requests: &mut Requests) {
            self.seen.push(Notification::Pause);
        }
    }

    #[test]
    fn pausing_from_play_callback_is_reentrant_safe() {
        let now = Instant::now();
        let mut controller = controller(0);
        let mut host = PauseOnPlay { seen: Vec::new() };

        controller.play(now);
        let delivered = controller.flush(&mut host, now);

        assert_eq!(delivered, 2);
        assert_eq!(
            host.seen,
            vec![Notification::Play { time: Some(0.0) }, Notification::Pause]
        );
        assert!(!controller.is_playing());
        assert_eq!(controller.next_deadline(), None);
        assert!(!controller.has_pending_notifications());
    }

    #[test]
    fn rebuild_pauses_and_announces_new_start() {
        let now = Instant::now();
        let mut controller = controller(0);
        controller.play(now);
        controller.take_notifications();

        controller.rebuild(Timeline::from_lines(&lrc::parse_lines("x\ny\nz"), 1_000), 9);
        assert_eq!(
            controller.take_notifications(),
            vec![
                Notification::Pause,
                Notification::LineChange { index: 2, time: None }
            ]
        );
        assert_eq!(controller.timeline().len(), 3);
    }
}
