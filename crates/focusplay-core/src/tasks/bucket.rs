//! Task bucket gate.
//!
//! A project may hold at most `MAX_ACTIVE_TASKS` non-archived tasks. The
//! store does not enforce this; every creation path asks the gate first.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ports::TaskDataProvider;

pub const MAX_ACTIVE_TASKS: u32 = 10;

/// Limit-gating view over a project's stored tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBucket {
    pub current_count: u32,
    pub max_limit: u32,
    pub has_completed_tasks: bool,
}

impl TaskBucket {
    pub fn load(provider: &impl TaskDataProvider, project_id: &str) -> Result<Self> {
        Ok(Self {
            current_count: provider.task_count(project_id)?,
            max_limit: MAX_ACTIVE_TASKS,
            has_completed_tasks: provider.has_completed_uncleared_tasks(project_id)?,
        })
    }

    pub fn remaining_slots(&self) -> u32 {
        self.max_limit.saturating_sub(self.current_count)
    }
}

/// Outcome of asking the gate before a task is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allowed,
    Blocked { message: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskBucketGate {
    cached_count: Option<u32>,
}

impl TaskBucketGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_create(current_count: u32) -> bool {
        current_count < MAX_ACTIVE_TASKS
    }

    /// User-facing explanation when creation is blocked, `None` otherwise.
    pub fn status_message(current_count: u32, has_completed_tasks: bool) -> Option<String> {
        if Self::can_create(current_count) {
            return None;
        }
        let message = if has_completed_tasks {
            format!(
                "This project already has {MAX_ACTIVE_TASKS} tasks. Clear completed tasks to make room for new ones."
            )
        } else {
            format!(
                "This project already has {MAX_ACTIVE_TASKS} tasks. Complete existing tasks before adding new ones."
            )
        };
        Some(message)
    }

    /// Load the bucket for `project_id` and decide.
    pub fn check(
        &mut self,
        provider: &impl TaskDataProvider,
        project_id: &str,
    ) -> Result<GateDecision> {
        let bucket = TaskBucket::load(provider, project_id)?;
        self.cached_count = Some(bucket.current_count);
        let decision = match Self::status_message(bucket.current_count, bucket.has_completed_tasks) {
            None => GateDecision::Allowed,
            Some(message) => {
                tracing::debug!(project_id, count = bucket.current_count, "task creation blocked");
                GateDecision::Blocked { message }
            }
        };
        Ok(decision)
    }

    /// Count seen by the last `check`.
    pub fn cached_count(&self) -> Option<u32> {
        self.cached_count
    }
}
