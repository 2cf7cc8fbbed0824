//! Task bucket commands for CLI.

use clap::Subcommand;
use focusplay_core::{Database, GateDecision, Task, TaskBucket, TaskBucketGate};
use serde_json::json;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task, unless the project's bucket is full
    Add {
        /// Project the task belongs to
        #[arg(long)]
        project: String,
        /// Task title
        title: String,
    },
    /// List a project's tasks
    List {
        #[arg(long)]
        project: String,
        /// Include cleared tasks
        #[arg(long)]
        all: bool,
    },
    /// Show how full a project's bucket is
    Bucket {
        #[arg(long)]
        project: String,
    },
    /// Mark a task as completed
    Complete {
        /// Task ID
        id: String,
    },
    /// Clear all completed tasks of a project
    Clear {
        #[arg(long)]
        project: String,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Add { project, title } => {
            let mut gate = TaskBucketGate::new();
            match gate.check(&db, &project)? {
                GateDecision::Allowed => {
                    let task = Task::new(project, title);
                    db.create_task(&task)?;
                    let out = json!({ "created": true, "task": task });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                GateDecision::Blocked { message } => {
                    let out = json!({ "created": false, "message": message });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }
        TaskAction::List { project, all } => {
            let tasks = db.list_tasks(&project, all)?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        TaskAction::Bucket { project } => {
            let bucket = TaskBucket::load(&db, &project)?;
            let out = json!({
                "bucket": bucket,
                "message": TaskBucketGate::status_message(bucket.current_count, bucket.has_completed_tasks),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        TaskAction::Complete { id } => {
            db.complete_task(&id)?;
            println!("Task completed: {id}");
        }
        TaskAction::Clear { project } => {
            let cleared = db.clear_completed(&project)?;
            println!("Cleared {cleared} completed task(s)");
        }
        TaskAction::Delete { id } => {
            db.delete_task(&id)?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}
