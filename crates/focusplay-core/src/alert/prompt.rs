//! Alert prompt controller.
//!
//! A prompt asks "are you still on this task?" and must resolve even when
//! nobody answers: after `ALERT_COUNTDOWN_SECS` ticks the configured
//! default response is applied through the same path as a user answer.
//!
//! ```text
//! Closed --open--> Open(countdown=30) --tick--> Open(countdown-1)
//! Open --respond--> Closed          (source: user)
//! Open(countdown=1) --tick--> Closed (source: timeout)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AlertError;
use crate::events::Event;
use crate::ports::AlertResponseSink;

/// Seconds a prompt waits for an answer.
pub const ALERT_COUNTDOWN_SECS: u32 = 30;

/// Self-reported state during a focus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertResponse {
    Focused,
    Deviated,
}

impl AlertResponse {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertResponse::Focused => "focused",
            AlertResponse::Deviated => "deviated",
        }
    }
}

impl std::fmt::Display for AlertResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertResponse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "focused" | "f" => Ok(AlertResponse::Focused),
            "deviated" | "d" => Ok(AlertResponse::Deviated),
            other => Err(format!("unknown alert response: {other}")),
        }
    }
}

/// Who closed the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    User,
    Timeout,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::User => "user",
            ResponseSource::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPrompt {
    pub task_name: String,
    pub countdown: u32,
    pub opened_at: DateTime<Utc>,
}

/// A closed prompt's outcome, as reported to the response sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub task_name: String,
    pub response: AlertResponse,
    pub source: ResponseSource,
    pub project_id: Option<String>,
    pub responded_at: DateTime<Utc>,
}

/// Owns at most one open prompt.
pub struct AlertPromptController {
    default_response: AlertResponse,
    prompt: Option<AlertPrompt>,
    last_response: Option<RecordedResponse>,
    project_id: Option<String>,
    sink: Option<Box<dyn AlertResponseSink>>,
}

impl std::fmt::Debug for AlertPromptController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertPromptController")
            .field("default_response", &self.default_response)
            .field("prompt", &self.prompt)
            .field("last_response", &self.last_response)
            .finish_non_exhaustive()
    }
}

impl AlertPromptController {
    pub fn new(default_response: AlertResponse) -> Self {
        Self {
            default_response,
            prompt: None,
            last_response: None,
            project_id: None,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: impl AlertResponseSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.prompt.is_some()
    }

    pub fn prompt(&self) -> Option<&AlertPrompt> {
        self.prompt.as_ref()
    }

    /// Outcome of the most recently closed prompt.
    pub fn last_response(&self) -> Option<&RecordedResponse> {
        self.last_response.as_ref()
    }

    pub fn default_response(&self) -> AlertResponse {
        self.default_response
    }

    pub fn set_default_response(&mut self, response: AlertResponse) {
        self.default_response = response;
    }

    /// Open a prompt for `task_name`.
    ///
    /// # Errors
    /// `AlertError::AlreadyOpen` if a prompt is still waiting.
    pub fn open(&mut self, task_name: impl Into<String>) -> Result<Event, AlertError> {
        if let Some(open) = &self.prompt {
            return Err(AlertError::AlreadyOpen {
                task_name: open.task_name.clone(),
            });
        }
        let prompt = AlertPrompt {
            task_name: task_name.into(),
            countdown: ALERT_COUNTDOWN_SECS,
            opened_at: Utc::now(),
        };
        tracing::debug!(task = %prompt.task_name, "alert prompt opened");
        let event = Event::AlertOpened {
            task_name: prompt.task_name.clone(),
            countdown: prompt.countdown,
            at: prompt.opened_at,
        };
        self.prompt = Some(prompt);
        Ok(event)
    }

    /// Count down one second. Resolves with the default response when the
    /// countdown hits zero; a no-op once closed.
    pub fn tick(&mut self) -> Option<Event> {
        let prompt = self.prompt.as_mut()?;
        prompt.countdown = prompt.countdown.saturating_sub(1);
        if prompt.countdown > 0 {
            return Some(Event::AlertCountdown {
                task_name: prompt.task_name.clone(),
                countdown: prompt.countdown,
            });
        }
        let response = self.default_response;
        self.resolve(response, ResponseSource::Timeout)
    }

    /// Answer the open prompt.
    ///
    /// # Errors
    /// `AlertError::StaleResponse` if no prompt is open; the previously
    /// recorded response is left as is.
    pub fn respond(&mut self, response: AlertResponse) -> Result<Event, AlertError> {
        self.resolve(response, ResponseSource::User)
            .ok_or(AlertError::StaleResponse)
    }

    fn resolve(&mut self, response: AlertResponse, source: ResponseSource) -> Option<Event> {
        let prompt = self.prompt.take()?;
        let recorded = RecordedResponse {
            task_name: prompt.task_name,
            response,
            source,
            project_id: self.project_id.clone(),
            responded_at: Utc::now(),
        };
        tracing::info!(
            task = %recorded.task_name,
            response = %recorded.response,
            source = recorded.source.as_str(),
            "alert prompt resolved"
        );
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.record_alert_response(&recorded) {
                tracing::warn!(%err, "failed to record alert response");
            }
        }
        let event = Event::AlertResolved {
            task_name: recorded.task_name.clone(),
            response: recorded.response,
            source: recorded.source,
            at: recorded.responded_at,
        };
        self.last_response = Some(recorded);
        Some(event)
    }
}
