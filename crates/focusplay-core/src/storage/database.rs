//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - Completed timer modes
//! - Daily achievement statistics (upserted per day and project)
//! - Alert prompt responses
//! - Project task buckets

use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::data_dir;
use crate::alert::{AlertResponse, RecordedResponse};
use crate::error::{DatabaseError, Result};
use crate::ports::{AlertResponseSink, SessionSink, StatsRecord, TaskDataProvider};
use crate::tasks::Task;
use crate::timer::{CompletedSession, TimerMode};

/// Totals over a range of days.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_focus: u64,
    pub total_focus_secs: u64,
    pub total_break_secs: u64,
    pub focused_responses: u64,
    pub deviated_responses: u64,
}

impl Stats {
    /// Share of alert prompts answered (or defaulted) as focused.
    pub fn focus_rate(&self) -> Option<f64> {
        let total = self.focused_responses + self.deviated_responses;
        if total == 0 {
            return None;
        }
        Some(self.focused_responses as f64 / total as f64)
    }
}

/// One row of the daily achievement log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayStats {
    pub day: NaiveDate,
    pub completed_focus: u64,
    pub focus_secs: u64,
    pub break_secs: u64,
    pub focused_responses: u64,
    pub deviated_responses: u64,
}

/// Aggregate contribution of one record to its day's row.
#[derive(Default)]
struct DailyDelta {
    focus_secs: i64,
    break_secs: i64,
    completed_focus: i64,
    focused: i64,
    deviated: i64,
}

/// SQLite database for sessions, stats and tasks.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/focusplay.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("focusplay.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                mode          TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                project_id    TEXT NOT NULL DEFAULT '',
                completed_at  TEXT NOT NULL,
                day           TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_stats (
                day                TEXT NOT NULL,
                project_id         TEXT NOT NULL DEFAULT '',
                focus_secs         INTEGER NOT NULL DEFAULT 0,
                break_secs         INTEGER NOT NULL DEFAULT 0,
                completed_focus    INTEGER NOT NULL DEFAULT 0,
                focused_responses  INTEGER NOT NULL DEFAULT 0,
                deviated_responses INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (day, project_id)
            );

            CREATE TABLE IF NOT EXISTS alert_responses (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                task_name    TEXT NOT NULL,
                response     TEXT NOT NULL,
                source       TEXT NOT NULL,
                project_id   TEXT NOT NULL DEFAULT '',
                responded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id         TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                title      TEXT NOT NULL,
                completed  INTEGER NOT NULL DEFAULT 0,
                archived   INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_day ON sessions(project_id, day);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id, archived);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    // ── Sessions & daily stats ───────────────────────────────────────

    /// Record a completed mode and fold it into the day's stats.
    pub fn record_session(&self, session: &CompletedSession) -> Result<i64> {
        let project = session.project_id.as_deref().unwrap_or("");
        let day = day_of(session.completed_at);
        self.conn.execute(
            "INSERT INTO sessions (mode, duration_secs, project_id, completed_at, day)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.mode.as_str(),
                session.duration_secs,
                project,
                session.completed_at.to_rfc3339(),
                day.to_string(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        let delta = match session.mode {
            TimerMode::Focus => DailyDelta {
                focus_secs: session.duration_secs,
                completed_focus: 1,
                ..DailyDelta::default()
            },
            TimerMode::ShortBreak | TimerMode::LongBreak => DailyDelta {
                break_secs: session.duration_secs,
                ..DailyDelta::default()
            },
        };
        self.upsert_daily(day, project, &delta)?;
        Ok(id)
    }

    /// Record a closed alert prompt and fold it into the day's stats.
    pub fn record_alert_response(&self, response: &RecordedResponse) -> Result<i64> {
        let project = response.project_id.as_deref().unwrap_or("");
        self.conn.execute(
            "INSERT INTO alert_responses (task_name, response, source, project_id, responded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                response.task_name,
                response.response.as_str(),
                response.source.as_str(),
                project,
                response.responded_at.to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        let delta = match response.response {
            AlertResponse::Focused => DailyDelta {
                focused: 1,
                ..DailyDelta::default()
            },
            AlertResponse::Deviated => DailyDelta {
                deviated: 1,
                ..DailyDelta::default()
            },
        };
        self.upsert_daily(day_of(response.responded_at), project, &delta)?;
        Ok(id)
    }

    /// Persist anything a `ChannelSink` forwarded.
    pub fn record(&self, record: &StatsRecord) -> Result<i64> {
        match record {
            StatsRecord::Session(session) => self.record_session(session),
            StatsRecord::AlertResponse(response) => self.record_alert_response(response),
        }
    }

    fn upsert_daily(&self, day: NaiveDate, project: &str, delta: &DailyDelta) -> Result<()> {
        self.conn.execute(
            "INSERT INTO daily_stats
                (day, project_id, focus_secs, break_secs, completed_focus,
                 focused_responses, deviated_responses)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(day, project_id) DO UPDATE SET
                focus_secs         = focus_secs + excluded.focus_secs,
                break_secs         = break_secs + excluded.break_secs,
                completed_focus    = completed_focus + excluded.completed_focus,
                focused_responses  = focused_responses + excluded.focused_responses,
                deviated_responses = deviated_responses + excluded.deviated_responses",
            params![
                day.to_string(),
                project,
                delta.focus_secs,
                delta.break_secs,
                delta.completed_focus,
                delta.focused,
                delta.deviated,
            ],
        )?;
        Ok(())
    }

    /// Stats for the current local day, optionally for one project.
    pub fn stats_today(&self, project_id: Option<&str>) -> Result<Stats> {
        let today = Local::now().date_naive();
        self.stats_between(project_id, Some(today), Some(today))
    }

    /// All-time stats, optionally for one project.
    pub fn stats_all(&self, project_id: Option<&str>) -> Result<Stats> {
        self.stats_between(project_id, None, None)
    }

    fn stats_between(
        &self,
        project_id: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Stats> {
        let from = from.map(|d| d.to_string());
        let to = to.map(|d| d.to_string());

        let mut stats = self.conn.query_row(
            "SELECT COALESCE(SUM(completed_focus), 0), COALESCE(SUM(focus_secs), 0),
                    COALESCE(SUM(break_secs), 0), COALESCE(SUM(focused_responses), 0),
                    COALESCE(SUM(deviated_responses), 0)
             FROM daily_stats
             WHERE (?1 IS NULL OR project_id = ?1)
               AND (?2 IS NULL OR day >= ?2)
               AND (?3 IS NULL OR day <= ?3)",
            params![project_id, from, to],
            |row| {
                Ok(Stats {
                    total_sessions: 0,
                    completed_focus: row.get(0)?,
                    total_focus_secs: row.get(1)?,
                    total_break_secs: row.get(2)?,
                    focused_responses: row.get(3)?,
                    deviated_responses: row.get(4)?,
                })
            },
        )?;

        stats.total_sessions = self.conn.query_row(
            "SELECT COUNT(*) FROM sessions
             WHERE (?1 IS NULL OR project_id = ?1)
               AND (?2 IS NULL OR day >= ?2)
               AND (?3 IS NULL OR day <= ?3)",
            params![project_id, from, to],
            |row| row.get(0),
        )?;
        Ok(stats)
    }

    /// Daily rows in `[from, to]`, oldest first, summed across projects
    /// unless `project_id` is given.
    pub fn daily_stats(
        &self,
        project_id: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, SUM(completed_focus), SUM(focus_secs), SUM(break_secs),
                    SUM(focused_responses), SUM(deviated_responses)
             FROM daily_stats
             WHERE (?1 IS NULL OR project_id = ?1) AND day >= ?2 AND day <= ?3
             GROUP BY day
             ORDER BY day",
        )?;
        let rows = stmt.query_map(params![project_id, from.to_string(), to.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, u64>(5)?,
            ))
        })?;

        let mut days = Vec::new();
        for row in rows {
            let (day, completed_focus, focus_secs, break_secs, focused, deviated) = row?;
            let day = day
                .parse::<NaiveDate>()
                .map_err(|e| DatabaseError::QueryFailed(format!("bad day '{day}': {e}")))?;
            days.push(DayStats {
                day,
                completed_focus,
                focus_secs,
                break_secs,
                focused_responses: focused,
                deviated_responses: deviated,
            });
        }
        Ok(days)
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Insert a task. The bucket limit is the caller's job (`TaskBucketGate`).
    pub fn create_task(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tasks (id, project_id, title, completed, archived, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                task.id,
                task.project_id,
                task.title,
                task.completed,
                task.archived,
                task.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, project_id, title, completed, archived, created_at
                 FROM tasks WHERE id = ?1",
                params![id],
                task_row,
            )
            .optional()?;
        row.map(into_task).transpose()
    }

    /// Tasks of a project, oldest first.
    pub fn list_tasks(&self, project_id: &str, include_archived: bool) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, title, completed, archived, created_at
             FROM tasks
             WHERE project_id = ?1 AND (?2 OR archived = 0)
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![project_id, include_archived], task_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(into_task(row?)?);
        }
        Ok(tasks)
    }

    pub fn complete_task(&self, id: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET completed = 1 WHERE id = ?1 AND archived = 0",
            params![id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "task",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Archive every completed task of a project, freeing their slots.
    pub fn clear_completed(&self, project_id: &str) -> Result<usize> {
        let cleared = self.conn.execute(
            "UPDATE tasks SET archived = 1
             WHERE project_id = ?1 AND completed = 1 AND archived = 0",
            params![project_id],
        )?;
        Ok(cleared)
    }

    pub fn delete_task(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "task",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl TaskDataProvider for Database {
    fn task_count(&self, project_id: &str) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE project_id = ?1 AND archived = 0",
            params![project_id],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn has_completed_uncleared_tasks(&self, project_id: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM tasks WHERE project_id = ?1 AND completed = 1 AND archived = 0
             )",
            params![project_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }
}

impl SessionSink for Database {
    fn record_completed_session(&self, session: &CompletedSession) -> Result<()> {
        self.record_session(session).map(|_| ())
    }
}

impl AlertResponseSink for Database {
    fn record_alert_response(&self, response: &RecordedResponse) -> Result<()> {
        Database::record_alert_response(self, response).map(|_| ())
    }
}

type TaskRow = (String, String, String, bool, bool, String);

fn task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_task((id, project_id, title, completed, archived, created_at): TaskRow) -> Result<Task> {
    Ok(Task {
        id,
        project_id,
        title,
        completed,
        archived,
        created_at: parse_ts(&created_at)?,
    })
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(value)
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{value}': {e}")))?;
    Ok(ts.with_timezone(&Utc))
}

/// Stats are bucketed by the user's local calendar day.
fn day_of(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}
