//! Task bucket gate against the SQLite store.

use focusplay_core::{Database, GateDecision, Task, TaskBucket, TaskBucketGate, MAX_ACTIVE_TASKS};

/// The creation path every front end follows: ask, then write.
fn try_create(db: &Database, gate: &mut TaskBucketGate, project: &str, title: &str) -> GateDecision {
    let decision = gate.check(db, project).unwrap();
    if decision.is_allowed() {
        db.create_task(&Task::new(project, title)).unwrap();
    }
    decision
}

#[test]
fn bucket_fills_to_limit_then_blocks() {
    let db = Database::open_memory().unwrap();
    let mut gate = TaskBucketGate::new();

    for i in 0..MAX_ACTIVE_TASKS {
        assert_eq!(try_create(&db, &mut gate, "proj", &format!("task {i}")), GateDecision::Allowed);
    }
    match try_create(&db, &mut gate, "proj", "one too many") {
        GateDecision::Blocked { message } => assert!(message.contains("Complete existing")),
        GateDecision::Allowed => panic!("11th task must be blocked"),
    }
    assert_eq!(db.list_tasks("proj", false).unwrap().len(), MAX_ACTIVE_TASKS as usize);
    assert_eq!(gate.cached_count(), Some(MAX_ACTIVE_TASKS));

    // Other projects have their own bucket.
    assert!(try_create(&db, &mut gate, "other", "fine").is_allowed());
}

#[test]
fn clearing_completed_tasks_frees_slots() {
    let db = Database::open_memory().unwrap();
    let mut gate = TaskBucketGate::new();
    for i in 0..MAX_ACTIVE_TASKS {
        try_create(&db, &mut gate, "proj", &format!("task {i}"));
    }
    let first = db.list_tasks("proj", false).unwrap().remove(0);
    db.complete_task(&first.id).unwrap();

    match gate.check(&db, "proj").unwrap() {
        GateDecision::Blocked { message } => assert!(message.contains("Clear completed")),
        GateDecision::Allowed => panic!("completed tasks still occupy slots"),
    }

    db.clear_completed("proj").unwrap();
    let bucket = TaskBucket::load(&db, "proj").unwrap();
    assert_eq!(bucket.current_count, MAX_ACTIVE_TASKS - 1);
    assert!(!bucket.has_completed_tasks);
    assert!(try_create(&db, &mut gate, "proj", "new").is_allowed());
}
