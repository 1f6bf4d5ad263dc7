mod test_support;

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tempfile::TempDir;

use autopilot_module::autopilot::{
    AutopilotStateStore, ProcessedLedger, StopFlag, TriageRunner, TRIAGE_LOCK_STALENESS,
};
use autopilot_module::{AgentIdentity, ExecutionLock, ExecutionStatus};

use test_support::{message, FakeMailbox, FixedClock, ScriptedExecutor};

const TZ: Tz = chrono_tz::Asia::Kolkata;

struct Fixture {
    runner: TriageRunner<FakeMailbox, ScriptedExecutor>,
    mailbox: FakeMailbox,
    executor: ScriptedExecutor,
    ledger_path: std::path::PathBuf,
    lock_path: std::path::PathBuf,
    stop_flag_path: std::path::PathBuf,
    _temp: TempDir,
}

fn fixture(mailbox: FakeMailbox) -> Fixture {
    let temp = TempDir::new().expect("tempdir");
    let state_path = temp.path().join("autopilot_state.json");
    let ledger_path = temp.path().join("processed_mails.json");
    let lock_path = temp.path().join("autopilot.lock");
    let stop_flag_path = temp.path().join("autopilot_stop.flag");

    let executor = ScriptedExecutor::answering("Replied to the customer and marked read.");
    let runner = TriageRunner::new(
        AutopilotStateStore::new(&state_path),
        ProcessedLedger::new(&ledger_path),
        ExecutionLock::new(&lock_path, TRIAGE_LOCK_STALENESS),
        StopFlag::new(&stop_flag_path),
        mailbox.clone(),
        executor.clone(),
        AgentIdentity {
            name: "Sales Agent".to_string(),
            email: "agent@example.com".to_string(),
        },
        FixedClock::starting_at("2025-06-02T09:00:00+05:30"),
        TZ,
    );
    Fixture {
        runner,
        mailbox,
        executor,
        ledger_path,
        lock_path,
        stop_flag_path,
        _temp: temp,
    }
}

fn ledger_ids(fixture: &Fixture) -> Vec<String> {
    ProcessedLedger::new(&fixture.ledger_path)
        .load()
        .into_iter()
        .collect()
}

#[test]
fn processed_message_is_not_triaged_twice() {
    let fixture = fixture(FakeMailbox::with_unread(vec![message(
        "m1",
        "pricing question",
    )]));

    let outcomes = fixture.runner.run_sweep(5, false, true);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, ExecutionStatus::Success);
    assert_eq!(fixture.mailbox.marked_read(), vec!["m1".to_string()]);
    assert_eq!(ledger_ids(&fixture), vec!["m1".to_string()]);

    // The message is still visible as unread on the next sweep, but the
    // ledger keeps the executor from running again.
    let outcomes = fixture.runner.run_sweep(5, false, true);
    assert!(outcomes.is_empty());
    assert_eq!(fixture.executor.calls(), 1);
}

#[test]
fn failed_message_stays_out_of_ledger_and_is_retried() {
    let fixture = fixture(FakeMailbox::with_unread(vec![
        message("m1", "pricing question"),
        message("m2", "demo request"),
    ]));
    fixture.executor.push_success("Replied with pricing.");
    fixture.executor.push_failure("agent crashed");

    let outcomes = fixture.runner.run_sweep(5, false, true);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status, ExecutionStatus::Success);
    assert_eq!(outcomes[1].status, ExecutionStatus::Failed);
    assert_eq!(ledger_ids(&fixture), vec!["m1".to_string()]);

    // Only the failed message is picked up again.
    let outcomes = fixture.runner.run_sweep(5, false, true);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].message_id, "m2");
    assert_eq!(fixture.executor.calls(), 3);
    assert_eq!(
        ledger_ids(&fixture),
        vec!["m1".to_string(), "m2".to_string()]
    );
}

#[test]
fn max_actions_bounds_one_sweep() {
    let fixture = fixture(FakeMailbox::with_unread(vec![
        message("m1", "one"),
        message("m2", "two"),
        message("m3", "three"),
    ]));

    let outcomes = fixture.runner.run_sweep(2, false, true);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(ledger_ids(&fixture).len(), 2);

    // The remainder lands in the following sweep.
    let outcomes = fixture.runner.run_sweep(2, false, true);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].message_id, "m3");
}

#[test]
fn stop_flag_halts_manual_sweeps_only() {
    let fixture = fixture(FakeMailbox::with_unread(vec![message(
        "m1",
        "pricing question",
    )]));
    StopFlag::new(&fixture.stop_flag_path)
        .request()
        .expect("set stop flag");

    // Manual sweeps honour the flag.
    let outcomes = fixture.runner.run_sweep(5, false, false);
    assert!(outcomes.is_empty());
    assert_eq!(fixture.executor.calls(), 0);

    // The background service ignores it.
    let outcomes = fixture.runner.run_sweep(5, false, true);
    assert_eq!(outcomes.len(), 1);
}

#[test]
fn concurrent_triage_sweep_is_skipped() {
    let fixture = fixture(FakeMailbox::with_unread(vec![message(
        "m1",
        "pricing question",
    )]));
    let other = ExecutionLock::new(&fixture.lock_path, Duration::from_secs(600));
    let _guard = other
        .try_acquire()
        .expect("acquire")
        .expect("lock was free");

    let outcomes = fixture.runner.run_sweep(5, false, true);
    assert!(outcomes.is_empty());
    assert_eq!(fixture.executor.calls(), 0);
}

#[test]
fn triage_records_summary_and_builds_rule_context() {
    let fixture = fixture(FakeMailbox::with_unread(vec![message(
        "m1",
        "pricing question",
    )]));

    fixture.runner.run_sweep(5, true, true);

    let state = fixture.runner.state().load();
    assert_eq!(state.autopilot_summaries.len(), 1);
    assert_eq!(state.autopilot_summaries[0].subject, "pricing question");

    let instructions = fixture.executor.instructions();
    assert_eq!(instructions.len(), 1);
    // Default rules are enabled out of the box and sorted by priority.
    assert!(instructions[0].contains("[priority 1]"));
    assert!(instructions[0].contains("pricing question"));
    assert!(instructions[0].contains("HANDS-FREE MODE: ON"));
}
