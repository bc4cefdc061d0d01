//! Queue job CRUD tests.

use super::*;

#[test]
fn test_add_remove_update_key_counting() {
    let mgr = setup();
    assert_eq!(mgr.get_queue_job_keys().unwrap().len(), 0);

    for i in 0..100 {
        mgr.add_queue_job_detail(queue_job(&format!("test{}", i), 5)).unwrap();
    }
    assert_eq!(mgr.get_queue_job_keys().unwrap().len(), 100);

    mgr.remove_queue_job_detail(&Key::of("test17")).unwrap();
    assert_eq!(mgr.get_queue_job_keys().unwrap().len(), 99);
    assert!(!mgr.check_queue_job_exists(&Key::of("test17")).unwrap());

    // an update replaces the snapshot without changing the key count
    let mut updated = mgr.get_queue_job_detail(&Key::of("test10")).unwrap().unwrap();
    updated.priority = 9;
    mgr.update_queue_job_detail(updated).unwrap();
    assert_eq!(mgr.get_queue_job_keys().unwrap().len(), 99);
    assert_eq!(
        mgr.get_queue_job_detail(&Key::of("test10")).unwrap().unwrap().priority,
        9
    );
}

#[test]
fn test_duplicate_add_rejected() {
    let mgr = setup();
    mgr.add_queue_job_detail(queue_job("dup", 5)).unwrap();
    let err = mgr.add_queue_job_detail(queue_job("dup", 7)).unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateKey(_)));
    // the stored snapshot is the original one
    assert_eq!(mgr.get_queue_job_detail(&Key::of("dup")).unwrap().unwrap().priority, 5);
}

#[test]
fn test_remove_unknown_is_not_found() {
    let mgr = setup();
    let err = mgr.remove_queue_job_detail(&Key::of("ghost")).unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}

#[test]
fn test_update_unknown_is_not_found() {
    let mgr = setup();
    let err = mgr.update_queue_job_detail(queue_job("ghost", 5)).unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}

#[test]
fn test_update_returns_exact_snapshot() {
    let mgr = setup();
    let mut original = queue_job("report", 5);
    original.description = Some("weekly report".to_string());
    original
        .data
        .insert("format".to_string(), serde_json::json!("pdf"));
    mgr.add_queue_job_detail(original).unwrap();

    // the replacement drops the description and carries different data
    let mut replacement = queue_job("report", 8);
    replacement
        .data
        .insert("recipients".to_string(), serde_json::json!(["ops"]));
    mgr.update_queue_job_detail(replacement.clone()).unwrap();

    let stored = mgr.get_queue_job_detail(&Key::of("report")).unwrap().unwrap();
    // exactly the new snapshot, never a merge of old and new fields
    assert_eq!(stored, replacement);
}

#[test]
fn test_claim_order_is_priority_then_insertion() {
    let mgr = setup();
    mgr.add_queue_job_detail(queue_job("low", 1)).unwrap();
    mgr.add_queue_job_detail(queue_job("first", 5)).unwrap();
    mgr.add_queue_job_detail(queue_job("second", 5)).unwrap();
    mgr.add_queue_job_detail(queue_job("high", 9)).unwrap();
    assert_eq!(mgr.pending_count().unwrap(), 4);

    let order: Vec<_> = (0..4)
        .map(|_| mgr.claim_next().unwrap().unwrap().key.name)
        .collect();
    assert_eq!(order, vec!["high", "first", "second", "low"]);
    assert!(mgr.claim_next().unwrap().is_none());
}

#[test]
fn test_update_keeps_insertion_order_among_equals() {
    let mgr = setup();
    mgr.add_queue_job_detail(queue_job("a", 1)).unwrap();
    mgr.add_queue_job_detail(queue_job("b", 5)).unwrap();

    // reprioritizing "a" to match "b" keeps its earlier insertion slot
    mgr.update_queue_job_detail(queue_job("a", 5)).unwrap();

    assert_eq!(mgr.claim_next().unwrap().unwrap().key.name, "a");
    assert_eq!(mgr.claim_next().unwrap().unwrap().key.name, "b");
}

#[test]
fn test_removed_job_is_never_claimed() {
    let mgr = setup();
    mgr.add_queue_job_detail(queue_job("keep", 5)).unwrap();
    mgr.add_queue_job_detail(queue_job("drop", 9)).unwrap();
    mgr.remove_queue_job_detail(&Key::of("drop")).unwrap();

    assert_eq!(mgr.claim_next().unwrap().unwrap().key.name, "keep");
    assert!(mgr.claim_next().unwrap().is_none());
}
