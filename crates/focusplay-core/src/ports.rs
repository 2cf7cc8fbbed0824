//! Boundary contracts between the controllers and the surrounding
//! application.
//!
//! Sinks are fire-and-forget: the controllers log a failed call and carry
//! on, they never wait for persistence before advancing.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::alert::RecordedResponse;
use crate::error::{CoreError, Result};
use crate::timer::CompletedSession;

/// Read side of the externally stored task list.
pub trait TaskDataProvider {
    /// Number of non-archived tasks in the project.
    fn task_count(&self, project_id: &str) -> Result<u32>;

    /// Whether any task is completed but not yet cleared.
    fn has_completed_uncleared_tasks(&self, project_id: &str) -> Result<bool>;
}

/// Receives every mode that ran down to zero.
pub trait SessionSink: Send {
    fn record_completed_session(&self, session: &CompletedSession) -> Result<()>;
}

/// Receives every closed alert prompt.
pub trait AlertResponseSink: Send {
    fn record_alert_response(&self, response: &RecordedResponse) -> Result<()>;
}

/// Anything a sink may hand over to the stats recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatsRecord {
    Session(CompletedSession),
    AlertResponse(RecordedResponse),
}

/// Forwards records over an unbounded channel so that persistence happens
/// off the tick path. The receiving end decides where they go.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatsRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatsRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, record: StatsRecord) -> Result<()> {
        self.tx
            .send(record)
            .map_err(|_| CoreError::Custom("stats channel closed".into()))
    }
}

impl SessionSink for ChannelSink {
    fn record_completed_session(&self, session: &CompletedSession) -> Result<()> {
        self.send(StatsRecord::Session(session.clone()))
    }
}

impl AlertResponseSink for ChannelSink {
    fn record_alert_response(&self, response: &RecordedResponse) -> Result<()> {
        self.send(StatsRecord::AlertResponse(response.clone()))
    }
}
