//! Focus session controller.
//!
//! A tick-driven state machine over the three timer modes. It does not own
//! a clock: the caller invokes `tick()` once per elapsed second while the
//! session is mounted.
//!
//! ## Transitions
//!
//! ```text
//! focus --(natural completion)--> short_break | long_break
//! short_break | long_break --(natural completion)--> focus
//! any --(set_mode)--> any (paused, count untouched)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut session = FocusSession::new(TimerSettings::default())?;
//! session.start();
//! // Once per second:
//! session.tick(); // Some(Event::ModeCompleted { .. }) when a mode finishes
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mode::{TimerMode, TimerSettings};
use crate::error::SessionError;
use crate::events::Event;
use crate::ports::SessionSink;

/// A mode that ran down to zero, as reported to the persistence sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub mode: TimerMode,
    pub duration_secs: i64,
    pub project_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Owns the timer state of one mounted play area.
pub struct FocusSession {
    settings: TimerSettings,
    mode: TimerMode,
    /// Fixed when the mode is entered.
    duration_secs: i64,
    remaining_secs: i64,
    is_running: bool,
    completed_focus_count: u32,
    project_id: Option<String>,
    sink: Option<Box<dyn SessionSink>>,
}

impl std::fmt::Debug for FocusSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusSession")
            .field("mode", &self.mode)
            .field("duration_secs", &self.duration_secs)
            .field("remaining_secs", &self.remaining_secs)
            .field("is_running", &self.is_running)
            .field("completed_focus_count", &self.completed_focus_count)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl FocusSession {
    /// Create a paused session in focus mode.
    ///
    /// # Errors
    /// Returns `SessionError` if any configured duration is not positive or
    /// the long break interval is zero.
    pub fn new(settings: TimerSettings) -> Result<Self, SessionError> {
        settings.validate()?;
        let duration_secs = settings.validated_duration(TimerMode::Focus)?;
        Ok(Self {
            settings,
            mode: TimerMode::Focus,
            duration_secs,
            remaining_secs: duration_secs,
            is_running: false,
            completed_focus_count: 0,
            project_id: None,
            sink: None,
        })
    }

    /// Attach the sink that receives every completed mode.
    pub fn with_sink(mut self, sink: impl SessionSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn duration_secs(&self) -> i64 {
        self.duration_secs
    }

    pub fn remaining_secs(&self) -> i64 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.completed_focus_count
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.is_running {
            return None;
        }
        self.is_running = true;
        tracing::debug!(mode = %self.mode, remaining = self.remaining_secs, "timer started");
        Some(Event::TimerStarted {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.is_running {
            return None;
        }
        self.is_running = false;
        tracing::debug!(mode = %self.mode, remaining = self.remaining_secs, "timer paused");
        Some(Event::TimerPaused {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Rewind the current mode. The focus count is kept.
    pub fn reset(&mut self) -> Event {
        self.remaining_secs = self.duration_secs;
        self.is_running = false;
        Event::TimerReset {
            mode: self.mode,
            duration_secs: self.duration_secs,
            at: Utc::now(),
        }
    }

    /// Manual mode switch. Never counts as a completion.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidDuration` without touching state if
    /// the target mode has no positive duration.
    pub fn set_mode(&mut self, mode: TimerMode) -> Result<Event, SessionError> {
        self.enter(mode)?;
        self.is_running = false;
        tracing::debug!(%mode, duration = self.duration_secs, "mode set manually");
        Ok(Event::ModeChanged {
            mode,
            duration_secs: self.duration_secs,
            at: Utc::now(),
        })
    }

    /// Replace the configuration snapshot.
    ///
    /// The current mode keeps the duration it was entered with; new
    /// durations apply from the next mode entry.
    pub fn reconfigure(&mut self, settings: TimerSettings) -> Result<(), SessionError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Advance one second. No-op while paused.
    ///
    /// Returns `TimerTick` for an ordinary second and `ModeCompleted` when
    /// the countdown reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.is_running {
            return None;
        }
        self.remaining_secs = (self.remaining_secs - 1).max(0);
        if self.remaining_secs > 0 {
            return Some(Event::TimerTick {
                mode: self.mode,
                remaining_secs: self.remaining_secs,
                duration_secs: self.duration_secs,
            });
        }
        Some(self.complete())
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Enter `mode` with a full countdown. Leaves state untouched on error.
    fn enter(&mut self, mode: TimerMode) -> Result<(), SessionError> {
        let duration = self.settings.validated_duration(mode)?;
        self.mode = mode;
        self.duration_secs = duration;
        self.remaining_secs = duration;
        Ok(())
    }

    fn next_mode(&self) -> TimerMode {
        match self.mode {
            TimerMode::Focus => {
                if self.completed_focus_count % self.settings.long_break_interval == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Focus,
        }
    }

    fn complete(&mut self) -> Event {
        let completed_mode = self.mode;
        let at = Utc::now();
        self.record(CompletedSession {
            mode: completed_mode,
            duration_secs: self.duration_secs,
            project_id: self.project_id.clone(),
            completed_at: at,
        });

        if completed_mode == TimerMode::Focus {
            self.completed_focus_count += 1;
        }

        let next = self.next_mode();
        let auto_started = match self.enter(next) {
            Ok(()) => {
                self.is_running = self.settings.auto_starts(next);
                self.is_running
            }
            Err(err) => {
                // Settings are validated on the way in, so this only trips on a bug.
                tracing::error!(%err, "automatic transition rejected; session halted");
                self.is_running = false;
                false
            }
        };

        tracing::info!(
            completed = %completed_mode,
            next = %self.mode,
            focus_count = self.completed_focus_count,
            auto_started,
            "mode completed"
        );

        Event::ModeCompleted {
            completed_mode,
            next_mode: self.mode,
            completed_focus_count: self.completed_focus_count,
            next_duration_secs: self.duration_secs,
            auto_started,
            at,
        }
    }

    fn record(&self, session: CompletedSession) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.record_completed_session(&session) {
                tracing::warn!(%err, mode = %session.mode, "failed to record completed session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<CompletedSession>>>);

    impl SessionSink for RecordingSink {
        fn record_completed_session(&self, session: &CompletedSession) -> crate::Result<()> {
            self.0.lock().unwrap().push(session.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl SessionSink for FailingSink {
        fn record_completed_session(&self, _: &CompletedSession) -> crate::Result<()> {
            Err(crate::CoreError::Custom("store offline".into()))
        }
    }

    fn short_settings() -> TimerSettings {
        TimerSettings::from_secs(5, 3, 10)
    }

    fn run_out(session: &mut FocusSession) -> Event {
        let mut last = None;
        for _ in 0..session.remaining_secs() {
            last = session.tick();
        }
        last.expect("running session produces events")
    }

    #[test]
    fn new_session_is_paused_focus() {
        let session = FocusSession::new(short_settings()).unwrap();
        assert_eq!(session.mode(), TimerMode::Focus);
        assert_eq!(session.remaining_secs(), 5);
        assert!(!session.is_running());
        assert_eq!(session.completed_focus_count(), 0);
    }

    #[test]
    fn new_rejects_invalid_settings() {
        let err = FocusSession::new(TimerSettings::from_secs(0, 3, 10)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidDuration { mode: TimerMode::Focus, .. }));
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        assert!(session.start().is_some());
        assert!(session.start().is_none());
        assert_eq!(session.remaining_secs(), 5);

        assert!(session.pause().is_some());
        assert!(session.pause().is_none());
    }

    #[test]
    fn tick_while_paused_does_nothing() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        assert!(session.tick().is_none());
        assert_eq!(session.remaining_secs(), 5);

        session.start();
        session.tick();
        session.pause();
        assert!(session.tick().is_none());
        assert_eq!(session.remaining_secs(), 4);
    }

    #[test]
    fn pause_resume_keeps_remaining() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        session.start();
        session.tick();
        session.tick();
        session.pause();
        session.start();
        assert_eq!(session.remaining_secs(), 3);
    }

    #[test]
    fn reset_rewinds_but_keeps_count() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        session.start();
        run_out(&mut session);
        assert_eq!(session.completed_focus_count(), 1);

        session.start();
        session.tick();
        session.reset();
        assert_eq!(session.remaining_secs(), session.duration_secs());
        assert!(!session.is_running());
        assert_eq!(session.completed_focus_count(), 1);
    }

    #[test]
    fn focus_completion_goes_to_short_break() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        session.start();
        match run_out(&mut session) {
            Event::ModeCompleted {
                completed_mode,
                next_mode,
                completed_focus_count,
                auto_started,
                ..
            } => {
                assert_eq!(completed_mode, TimerMode::Focus);
                assert_eq!(next_mode, TimerMode::ShortBreak);
                assert_eq!(completed_focus_count, 1);
                assert!(!auto_started);
            }
            other => panic!("Expected ModeCompleted, got {other:?}"),
        }
        assert_eq!(session.remaining_secs(), 3);
        assert!(!session.is_running());
    }

    #[test]
    fn auto_start_flags_control_running_after_transition() {
        let settings = TimerSettings {
            auto_start_breaks: true,
            auto_start_pomodoros: false,
            ..short_settings()
        };
        let mut session = FocusSession::new(settings).unwrap();
        session.start();
        run_out(&mut session);
        assert_eq!(session.mode(), TimerMode::ShortBreak);
        assert!(session.is_running());

        run_out(&mut session);
        assert_eq!(session.mode(), TimerMode::Focus);
        assert!(!session.is_running());
    }

    #[test]
    fn every_fourth_focus_earns_long_break() {
        let settings = TimerSettings {
            auto_start_breaks: true,
            auto_start_pomodoros: true,
            ..TimerSettings::from_secs(2, 1, 1)
        };
        let mut session = FocusSession::new(settings).unwrap();
        session.start();

        let mut breaks = Vec::new();
        for _ in 0..12 {
            run_out(&mut session);
            breaks.push(session.mode());
            run_out(&mut session);
        }
        for (i, mode) in breaks.iter().enumerate() {
            let expected = if (i + 1) % 4 == 0 {
                TimerMode::LongBreak
            } else {
                TimerMode::ShortBreak
            };
            assert_eq!(*mode, expected, "after focus #{}", i + 1);
        }
        assert_eq!(session.completed_focus_count(), 12);
    }

    #[test]
    fn manual_mode_change_never_counts() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        session.start();
        session.tick();
        for mode in [
            TimerMode::ShortBreak,
            TimerMode::Focus,
            TimerMode::LongBreak,
            TimerMode::Focus,
        ] {
            session.set_mode(mode).unwrap();
            assert_eq!(session.mode(), mode);
            assert_eq!(session.remaining_secs(), session.duration_secs());
            assert!(!session.is_running());
        }
        assert_eq!(session.completed_focus_count(), 0);
    }

    #[test]
    fn reconfigure_applies_from_next_mode_entry() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        session
            .reconfigure(TimerSettings::from_secs(8, 4, 12))
            .unwrap();
        assert_eq!(session.duration_secs(), 5);

        session.set_mode(TimerMode::ShortBreak).unwrap();
        assert_eq!(session.duration_secs(), 4);
    }

    #[test]
    fn reconfigure_rejects_invalid_without_mutation() {
        let mut session = FocusSession::new(short_settings()).unwrap();
        let err = session
            .reconfigure(TimerSettings::from_secs(5, -1, 10))
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidDuration { mode: TimerMode::ShortBreak, .. }));
        assert_eq!(session.settings(), &short_settings());
    }

    #[test]
    fn countdown_override_sets_focus_length() {
        let settings = TimerSettings {
            countdown_override_secs: Some(7),
            ..short_settings()
        };
        let session = FocusSession::new(settings).unwrap();
        assert_eq!(session.duration_secs(), 7);
    }

    #[test]
    fn sink_receives_each_completion_once() {
        let sink = RecordingSink::default();
        let mut session = FocusSession::new(short_settings())
            .unwrap()
            .with_project("proj-1")
            .with_sink(sink.clone());
        session.start();
        run_out(&mut session);
        session.start();
        run_out(&mut session);

        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].mode, TimerMode::Focus);
        assert_eq!(recorded[0].duration_secs, 5);
        assert_eq!(recorded[0].project_id.as_deref(), Some("proj-1"));
        assert_eq!(recorded[1].mode, TimerMode::ShortBreak);
    }

    #[test]
    fn sink_failure_does_not_block_transition() {
        let mut session = FocusSession::new(short_settings())
            .unwrap()
            .with_sink(FailingSink);
        session.start();
        run_out(&mut session);
        assert_eq!(session.mode(), TimerMode::ShortBreak);
        assert_eq!(session.completed_focus_count(), 1);
    }
}
