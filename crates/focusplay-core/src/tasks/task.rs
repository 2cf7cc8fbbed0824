use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A task in a project's bucket.
///
/// Completed tasks still occupy a slot until they are cleared (archived).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            title: title.into(),
            completed: false,
            archived: false,
            created_at: Utc::now(),
        }
    }

    /// Counts against the bucket limit.
    pub fn is_active(&self) -> bool {
        !self.archived
    }
}
