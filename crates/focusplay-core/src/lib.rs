//! # Focusplay Core Library
//!
//! This library provides the core logic for the Focusplay focus timer.
//! The CLI binary is a thin layer over the same controllers.
//!
//! ## Architecture
//!
//! - **Focus Session**: A tick-driven state machine over focus, short break
//!   and long break; the caller invokes `tick()` once per second
//! - **Alert Prompt**: A single "still focused?" prompt that resolves with a
//!   default answer when its 30 second countdown runs out
//! - **Task Bucket Gate**: The one place that decides whether a project may
//!   take another task
//! - **Play Area**: Mounts a session and its prompt on two cancellable
//!   one-second tick sources
//! - **Storage**: SQLite sessions, daily stats and tasks; TOML configuration
//!
//! ## Key Components
//!
//! - [`FocusSession`]: Timer state machine
//! - [`AlertPromptController`]: Alert prompt lifecycle
//! - [`TaskBucketGate`]: Task-limit decision
//! - [`PlayArea`]: Tick driver with explicit mount/unmount
//! - [`Database`]: Session, stats and task persistence
//! - [`Config`]: Application configuration management

pub mod alert;
pub mod error;
pub mod events;
pub mod play;
pub mod ports;
pub mod storage;
pub mod tasks;
pub mod timer;

pub use alert::{
    AlertPrompt, AlertPromptController, AlertResponse, AlertSchedule, RecordedResponse,
    ResponseSource, ALERT_COUNTDOWN_SECS,
};
pub use error::{AlertError, ConfigError, CoreError, DatabaseError, Result, SessionError};
pub use events::Event;
pub use play::PlayArea;
pub use ports::{AlertResponseSink, ChannelSink, SessionSink, StatsRecord, TaskDataProvider};
pub use storage::{Config, Database, DayStats, Stats};
pub use tasks::{GateDecision, Task, TaskBucket, TaskBucketGate, MAX_ACTIVE_TASKS};
pub use timer::{CompletedSession, FocusSession, TimerMode, TimerSettings};
