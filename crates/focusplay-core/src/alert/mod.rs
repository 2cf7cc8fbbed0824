mod prompt;
mod schedule;

pub use prompt::{
    AlertPrompt, AlertPromptController, AlertResponse, RecordedResponse, ResponseSource,
    ALERT_COUNTDOWN_SECS,
};
pub use schedule::AlertSchedule;
