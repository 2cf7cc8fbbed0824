use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertResponse, ResponseSource};
use crate::timer::TimerMode;

/// Every state change in a play session produces an Event.
/// The mounting view renders them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: TimerMode,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        duration_secs: i64,
        at: DateTime<Utc>,
    },
    TimerTick {
        mode: TimerMode,
        remaining_secs: i64,
        duration_secs: i64,
    },
    /// A mode ran down to zero and the session moved on automatically.
    ModeCompleted {
        completed_mode: TimerMode,
        next_mode: TimerMode,
        completed_focus_count: u32,
        next_duration_secs: i64,
        auto_started: bool,
        at: DateTime<Utc>,
    },
    /// The user picked a mode tab.
    ModeChanged {
        mode: TimerMode,
        duration_secs: i64,
        at: DateTime<Utc>,
    },
    AlertOpened {
        task_name: String,
        countdown: u32,
        at: DateTime<Utc>,
    },
    AlertCountdown {
        task_name: String,
        countdown: u32,
    },
    AlertResolved {
        task_name: String,
        response: AlertResponse,
        source: ResponseSource,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        mode: TimerMode,
        duration_secs: i64,
        remaining_secs: i64,
        is_running: bool,
        completed_focus_count: u32,
        alert_open: bool,
        alert_countdown: Option<u32>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Tick events are high-volume; everything else is a state transition.
    pub fn is_tick(&self) -> bool {
        matches!(self, Event::TimerTick { .. } | Event::AlertCountdown { .. })
    }
}
