//! When to ask.
//!
//! Prompts are due after every `interval_secs` of *running focus* time.
//! Breaks and paused seconds do not count towards the interval.

use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSchedule {
    /// Zero disables prompts.
    interval_secs: u64,
    elapsed_focus_secs: u64,
}

impl AlertSchedule {
    pub fn every_secs(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            elapsed_focus_secs: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_secs > 0
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn elapsed_focus_secs(&self) -> u64 {
        self.elapsed_focus_secs
    }

    /// Account for one second in `mode`. Returns `true` when a prompt is due.
    pub fn observe(&mut self, mode: TimerMode, is_running: bool) -> bool {
        if !self.is_enabled() || !is_running || mode != TimerMode::Focus {
            return false;
        }
        self.elapsed_focus_secs += 1;
        if self.elapsed_focus_secs >= self.interval_secs {
            self.elapsed_focus_secs = 0;
            return true;
        }
        false
    }
}
