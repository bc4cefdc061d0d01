//! Node lease and orphaned-claim recovery tests.

use super::*;

#[test]
fn test_dead_node_unfired_claim_reverts_to_waiting() {
    let (a, b) = cluster_pair();
    a.store_job(job("j"), false).unwrap();
    a.store_trigger(trigger("t", "j", 1_000), false).unwrap();

    let acquired = a.acquire_next_triggers(1_000, 1, 0).unwrap();
    assert_eq!(acquired.len(), 1);

    // node-a never heartbeats: from node-b's view it is dead
    let repaired = b.recover_fired_triggers(2_000).unwrap();
    assert_eq!(repaired, 1);

    assert_eq!(b.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Waiting));
    assert_eq!(b.holder.fired_triggers.len().unwrap(), 0);
    // no recovery trigger for a claim that never fired
    assert!(b.get_trigger_keys(RECOVERY_GROUP).unwrap().is_empty());

    // the surviving node can now claim it
    let again = b.acquire_next_triggers(1_000, 1, 0).unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].key.name, "t");
}

#[test]
fn test_live_owner_claim_is_left_alone() {
    let (a, b) = cluster_pair();
    a.store_job(job("j"), false).unwrap();
    a.store_trigger(trigger("t", "j", 1_000), false).unwrap();

    a.record_heartbeat(1_000).unwrap();
    a.acquire_next_triggers(1_000, 1, 0).unwrap();

    // lease still valid, claim younger than the claim timeout
    let repaired = b.recover_fired_triggers(1_500).unwrap();
    assert_eq!(repaired, 0);
    assert_eq!(b.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Acquired));
}

#[test]
fn test_stale_claim_of_live_owner_is_released() {
    let (a, b) = cluster_pair();
    a.store_job(job("j"), false).unwrap();
    a.store_trigger(trigger("t", "j", 1_000), false).unwrap();

    a.acquire_next_triggers(1_000, 1, 0).unwrap();
    // keep the lease fresh while the claim goes stale past the 1s timeout
    a.record_heartbeat(5_000).unwrap();

    let repaired = b.recover_fired_triggers(5_000).unwrap();
    assert_eq!(repaired, 1);
    assert_eq!(b.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Waiting));
    assert_eq!(b.holder.fired_triggers.len().unwrap(), 0);
}

#[test]
fn test_crashed_execution_spawns_recovery_trigger() {
    let (a, b) = cluster_pair();
    let mut j = job("j");
    j.durable = true;
    j.requests_recovery = true;
    j.concurrent_execution_disallowed = true;
    a.store_job(j, false).unwrap();
    a.store_trigger(trigger("t", "j", 1_000), false).unwrap();

    let acquired = a.acquire_next_triggers(1_000, 1, 0).unwrap();
    let fired = a.triggers_fired(&acquired, 1_000).unwrap();
    assert_eq!(fired.len(), 1);
    assert!(b.holder.blocked_jobs.contains(&Key::of("j")).unwrap());

    // node-a dies mid-execution
    let repaired = b.recover_fired_triggers(2_000).unwrap();
    assert_eq!(repaired, 1);

    // the concurrency gate cannot outlive the dead execution
    assert!(!b.holder.blocked_jobs.contains(&Key::of("j")).unwrap());
    assert_eq!(b.holder.fired_triggers.len().unwrap(), 0);

    // a one-shot recovery trigger fires the job again
    let recovery_keys = b.get_trigger_keys(RECOVERY_GROUP).unwrap();
    assert_eq!(recovery_keys.len(), 1);
    let again = b.acquire_next_triggers(2_000, 10, 0).unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].key.group, RECOVERY_GROUP);
    assert_eq!(again[0].job_key, Key::of("j"));
}

#[test]
fn test_crashed_execution_without_recovery_flag_only_cleans_up() {
    let (a, b) = cluster_pair();
    let mut j = job("j");
    j.durable = true;
    a.store_job(j, false).unwrap();
    a.store_trigger(trigger("t", "j", 1_000), false).unwrap();

    let acquired = a.acquire_next_triggers(1_000, 1, 0).unwrap();
    a.triggers_fired(&acquired, 1_000).unwrap();

    let repaired = b.recover_fired_triggers(2_000).unwrap();
    assert_eq!(repaired, 1);
    assert!(b.get_trigger_keys(RECOVERY_GROUP).unwrap().is_empty());
    assert_eq!(b.holder.fired_triggers.len().unwrap(), 0);
}

#[test]
fn test_sweep_is_idempotent() {
    let (a, b) = cluster_pair();
    a.store_job(job("j"), false).unwrap();
    a.store_trigger(trigger("t", "j", 1_000), false).unwrap();
    a.acquire_next_triggers(1_000, 1, 0).unwrap();

    assert_eq!(b.recover_fired_triggers(2_000).unwrap(), 1);
    assert_eq!(b.recover_fired_triggers(2_000).unwrap(), 0);
    assert_eq!(a.recover_fired_triggers(2_000).unwrap(), 0);
    assert_eq!(b.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Waiting));
}

#[tokio::test]
async fn test_coordination_task_heartbeats() {
    let mut config = test_config("node-a");
    config.heartbeat_interval = std::time::Duration::from_millis(20);
    let store = std::sync::Arc::new(ClusteredJobStore::new(
        crate::cluster::MemoryBackend::new(),
        config,
    ));

    let handle = store.start_coordination();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    handle.abort();

    let lease = store.holder.node_leases.get(&"node-a".to_string()).unwrap();
    assert!(lease.is_some());
}

#[test]
fn test_own_claims_are_not_self_recovered() {
    let (a, _b) = cluster_pair();
    a.store_job(job("j"), false).unwrap();
    a.store_trigger(trigger("t", "j", 1_000), false).unwrap();
    a.acquire_next_triggers(1_000, 1, 0).unwrap();

    // even without a heartbeat, a node never treats itself as dead
    let repaired = a.recover_fired_triggers(1_500).unwrap();
    assert_eq!(repaired, 0);
    assert_eq!(a.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Acquired));
}
