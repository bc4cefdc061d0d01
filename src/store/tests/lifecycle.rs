//! Fire and completion transition tests.

use super::*;

#[test]
fn test_fire_advances_schedule_and_requeues() {
    let store = setup();
    store.store_job(job("j"), false).unwrap();
    store
        .store_trigger(
            TriggerDetail::repeating(Key::of("t"), Key::of("j"), 1_000, 500, REPEAT_INDEFINITELY),
            false,
        )
        .unwrap();

    let acquired = store.acquire_next_triggers(1_000, 1, 0).unwrap();
    let fired = store.triggers_fired(&acquired, 1_000).unwrap();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].fire_time, 1_000);
    assert_eq!(fired[0].job.key, Key::of("j"));
    assert_eq!(fired[0].trigger.next_fire_time, Some(1_500));

    assert_eq!(store.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Waiting));
    assert_eq!(store.holder.time_index.len().unwrap(), 1);

    let again = store.acquire_next_triggers(1_500, 1, 0).unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].next_fire_time, Some(1_500));
}

#[test]
fn test_fire_exhausted_trigger_completes_and_applies_deletion_policy() {
    let store = setup();
    store.store_job(job("once"), false).unwrap();
    store.store_trigger(trigger("t", "once", 1_000), false).unwrap();

    let acquired = store.acquire_next_triggers(1_000, 1, 0).unwrap();
    let fired = store.triggers_fired(&acquired, 1_000).unwrap();
    assert_eq!(fired.len(), 1);

    // one-shot: trigger gone, and the non-durable job with it
    assert!(!store.check_trigger_exists(&Key::of("t")).unwrap());
    assert!(!store.check_job_exists(&Key::of("once")).unwrap());
    assert_eq!(store.holder.time_index.len().unwrap(), 0);
}

#[test]
fn test_fire_exhausted_trigger_keeps_durable_job() {
    let store = setup();
    let mut j = job("keep");
    j.durable = true;
    store.store_job(j, false).unwrap();
    store.store_trigger(trigger("t", "keep", 1_000), false).unwrap();

    let acquired = store.acquire_next_triggers(1_000, 1, 0).unwrap();
    store.triggers_fired(&acquired, 1_000).unwrap();

    assert!(!store.check_trigger_exists(&Key::of("t")).unwrap());
    assert!(store.check_job_exists(&Key::of("keep")).unwrap());
}

#[test]
fn test_fired_results_skip_released_triggers() {
    let store = setup();
    store.store_job(job("j"), false).unwrap();
    store.store_trigger(trigger("t", "j", 1_000), false).unwrap();

    let acquired = store.acquire_next_triggers(1_000, 1, 0).unwrap();
    store.release_acquired_trigger(&acquired[0]).unwrap();

    let fired = store.triggers_fired(&acquired, 1_000).unwrap();
    assert!(fired.is_empty());
    assert_eq!(store.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Waiting));
}

#[test]
fn test_concurrency_gate_blocks_and_completion_lifts_it() {
    let store = setup();
    let mut j = job("j");
    j.concurrent_execution_disallowed = true;
    j.durable = true;
    store.store_job(j, false).unwrap();
    store.store_trigger(trigger("ta", "j", 1_000), false).unwrap();
    store
        .store_trigger(
            TriggerDetail::repeating(Key::of("tb"), Key::of("j"), 2_000, 1_000, REPEAT_INDEFINITELY),
            false,
        )
        .unwrap();

    let acquired = store.acquire_next_triggers(1_000, 10, 0).unwrap();
    assert_eq!(acquired.len(), 1);
    let fired = store.triggers_fired(&acquired, 1_000).unwrap();
    assert_eq!(fired.len(), 1);

    // while the execution runs, the sibling is held back and the index is
    // empty: a trigger is never in two places at once
    assert_eq!(store.get_trigger_state(&Key::of("tb")).unwrap(), Some(TriggerState::Blocked));
    assert!(store.holder.blocked_jobs.contains(&Key::of("j")).unwrap());
    assert_eq!(store.holder.time_index.len().unwrap(), 0);
    assert!(store.acquire_next_triggers(5_000, 10, 0).unwrap().is_empty());

    store
        .triggered_job_complete(&fired[0].trigger, &Key::of("j"), CompletedInstruction::NoInstruction)
        .unwrap();

    assert!(!store.holder.blocked_jobs.contains(&Key::of("j")).unwrap());
    assert_eq!(store.get_trigger_state(&Key::of("tb")).unwrap(), Some(TriggerState::Waiting));
    assert_eq!(store.holder.time_index.len().unwrap(), 1);
    assert_eq!(store.holder.fired_triggers.len().unwrap(), 0);

    let next = store.acquire_next_triggers(2_000, 10, 0).unwrap();
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].key.name, "tb");
}

#[test]
fn test_completion_instruction_delete_trigger() {
    let store = setup();
    store.store_job(job("j"), false).unwrap();
    store
        .store_trigger(
            TriggerDetail::repeating(Key::of("t"), Key::of("j"), 1_000, 500, REPEAT_INDEFINITELY),
            false,
        )
        .unwrap();

    let acquired = store.acquire_next_triggers(1_000, 1, 0).unwrap();
    let fired = store.triggers_fired(&acquired, 1_000).unwrap();
    store
        .triggered_job_complete(&fired[0].trigger, &Key::of("j"), CompletedInstruction::DeleteTrigger)
        .unwrap();

    assert!(!store.check_trigger_exists(&Key::of("t")).unwrap());
    assert_eq!(store.holder.time_index.len().unwrap(), 0);
}

#[test]
fn test_completion_instruction_set_trigger_error() {
    let store = setup();
    store.store_job(job("j"), false).unwrap();
    store
        .store_trigger(
            TriggerDetail::repeating(Key::of("t"), Key::of("j"), 1_000, 500, REPEAT_INDEFINITELY),
            false,
        )
        .unwrap();

    let acquired = store.acquire_next_triggers(1_000, 1, 0).unwrap();
    let fired = store.triggers_fired(&acquired, 1_000).unwrap();
    store
        .triggered_job_complete(&fired[0].trigger, &Key::of("j"), CompletedInstruction::SetTriggerError)
        .unwrap();

    assert_eq!(store.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Error));
    assert_eq!(store.holder.time_index.len().unwrap(), 0);
    // quarantined triggers stay out of rotation
    assert!(store.acquire_next_triggers(9_000, 10, 0).unwrap().is_empty());
}

#[test]
fn test_completion_instruction_spans_all_job_triggers() {
    let store = setup();
    let mut j = job("j");
    j.durable = true;
    store.store_job(j, false).unwrap();
    store
        .store_trigger(
            TriggerDetail::repeating(Key::of("t1"), Key::of("j"), 1_000, 500, REPEAT_INDEFINITELY),
            false,
        )
        .unwrap();
    store.store_trigger(trigger("t2", "j", 9_000), false).unwrap();

    let acquired = store.acquire_next_triggers(1_000, 1, 0).unwrap();
    let fired = store.triggers_fired(&acquired, 1_000).unwrap();
    store
        .triggered_job_complete(
            &fired[0].trigger,
            &Key::of("j"),
            CompletedInstruction::SetAllJobTriggersComplete,
        )
        .unwrap();

    // every trigger of the job completed; the durable job remains
    assert!(!store.check_trigger_exists(&Key::of("t1")).unwrap());
    assert!(!store.check_trigger_exists(&Key::of("t2")).unwrap());
    assert!(store.check_job_exists(&Key::of("j")).unwrap());
    assert_eq!(store.holder.time_index.len().unwrap(), 0);
}

#[test]
fn test_trigger_with_missing_job_is_quarantined() {
    let store = setup();
    store.store_job(job("j"), false).unwrap();
    store.store_trigger(trigger("t", "j", 1_000), false).unwrap();

    // delete the job out of band, bypassing trigger cleanup
    store.holder.jobs.remove(&Key::of("j")).unwrap();

    let acquired = store.acquire_next_triggers(1_000, 10, 0).unwrap();
    assert!(acquired.is_empty());
    assert_eq!(store.get_trigger_state(&Key::of("t")).unwrap(), Some(TriggerState::Error));
    assert_eq!(store.holder.time_index.len().unwrap(), 0);
}
