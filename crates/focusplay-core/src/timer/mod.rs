mod mode;
mod session;

pub use mode::{TimerMode, TimerSettings};
pub use session::{CompletedSession, FocusSession};
