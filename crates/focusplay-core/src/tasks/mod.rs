mod bucket;
mod task;

pub use bucket::{GateDecision, TaskBucket, TaskBucketGate, MAX_ACTIVE_TASKS};
pub use task::Task;
