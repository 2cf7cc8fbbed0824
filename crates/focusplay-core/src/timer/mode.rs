use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "short_break",
            TimerMode::LongBreak => "long_break",
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, TimerMode::Focus)
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "focus" => Ok(TimerMode::Focus),
            "short_break" | "short" => Ok(TimerMode::ShortBreak),
            "long_break" | "long" => Ok(TimerMode::LongBreak),
            other => Err(format!("unknown timer mode: {other}")),
        }
    }
}

/// Read-only snapshot of the user's timer configuration, in seconds.
///
/// Consumed when a session is constructed and on explicit
/// reconfiguration. Durations are signed so that a negative value coming
/// from outside can be represented and rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub focus_secs: i64,
    pub short_break_secs: i64,
    pub long_break_secs: i64,
    /// Every n-th completed focus earns a long break.
    pub long_break_interval: u32,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
    /// Replaces `focus_secs` when set.
    #[serde(default)]
    pub countdown_override_secs: Option<i64>,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_secs: 25 * 60,
            short_break_secs: 5 * 60,
            long_break_secs: 15 * 60,
            long_break_interval: 4,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            countdown_override_secs: None,
        }
    }
}

impl TimerSettings {
    /// Convenience constructor for second-based durations with the default
    /// interval and auto-start flags off.
    pub fn from_secs(focus_secs: i64, short_break_secs: i64, long_break_secs: i64) -> Self {
        Self {
            focus_secs,
            short_break_secs,
            long_break_secs,
            ..Self::default()
        }
    }

    pub fn duration_for(&self, mode: TimerMode) -> i64 {
        match mode {
            TimerMode::Focus => self.countdown_override_secs.unwrap_or(self.focus_secs),
            TimerMode::ShortBreak => self.short_break_secs,
            TimerMode::LongBreak => self.long_break_secs,
        }
    }

    /// Duration for `mode`, or the reason it cannot be entered.
    pub fn validated_duration(&self, mode: TimerMode) -> Result<i64, SessionError> {
        let seconds = self.duration_for(mode);
        if seconds <= 0 {
            return Err(SessionError::InvalidDuration { mode, seconds });
        }
        Ok(seconds)
    }

    /// Checks every mode and the long break interval.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.long_break_interval == 0 {
            return Err(SessionError::InvalidLongBreakInterval);
        }
        for mode in [TimerMode::Focus, TimerMode::ShortBreak, TimerMode::LongBreak] {
            self.validated_duration(mode)?;
        }
        // An override replaces focus, but a bad base value is still a bad config.
        if self.focus_secs <= 0 {
            return Err(SessionError::InvalidDuration {
                mode: TimerMode::Focus,
                seconds: self.focus_secs,
            });
        }
        Ok(())
    }

    /// Whether an automatic transition into `mode` starts running.
    pub fn auto_starts(&self, mode: TimerMode) -> bool {
        if mode.is_break() {
            self.auto_start_breaks
        } else {
            self.auto_start_pomodoros
        }
    }
}
