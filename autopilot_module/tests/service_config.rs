use std::env;

use serial_test::serial;

use autopilot_module::service::ServiceConfig;

const KEYS: &[&str] = &[
    "ACTION_PLAN_SERVICE_INTERVAL",
    "ACTION_PLAN_SERVICE_HANDS_FREE",
    "AUTOPILOT_SERVICE_INTERVAL",
    "AUTOPILOT_SERVICE_HANDS_FREE",
    "AUTOPILOT_MAX_ACTIONS",
    "SCHEDULER_TIMEZONE",
    "AGENT_USER_NAME",
    "AGENT_USER_EMAIL",
    "ACTION_PLANS_STATE_FILE",
];

fn clear_env() {
    for key in KEYS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn config_defaults_are_runnable() {
    clear_env();
    let config = ServiceConfig::from_env().expect("config");
    assert_eq!(config.plan_sweep_interval.as_secs(), 30);
    assert_eq!(config.autopilot_sweep_interval.as_secs(), 200);
    assert!(!config.plan_hands_free);
    assert_eq!(config.autopilot_max_actions, 3);
    assert_eq!(config.timezone, chrono_tz::Asia::Kolkata);
    assert_eq!(config.identity.name, "Sales Agent");
    assert_eq!(
        config.plan_state_path.to_string_lossy(),
        "action_plans_state.json"
    );
}

#[test]
#[serial]
fn config_reads_environment_overrides() {
    clear_env();
    env::set_var("ACTION_PLAN_SERVICE_INTERVAL", "5");
    env::set_var("ACTION_PLAN_SERVICE_HANDS_FREE", "true");
    env::set_var("AUTOPILOT_MAX_ACTIONS", "7");
    env::set_var("SCHEDULER_TIMEZONE", "America/Chicago");
    env::set_var("AGENT_USER_NAME", "Dana");
    env::set_var("ACTION_PLANS_STATE_FILE", "/tmp/plans.json");

    let config = ServiceConfig::from_env().expect("config");
    assert_eq!(config.plan_sweep_interval.as_secs(), 5);
    assert!(config.plan_hands_free);
    assert_eq!(config.autopilot_max_actions, 7);
    assert_eq!(config.timezone, chrono_tz::America::Chicago);
    assert_eq!(config.identity.name, "Dana");
    assert_eq!(config.plan_state_path.to_string_lossy(), "/tmp/plans.json");

    clear_env();
}

#[test]
#[serial]
fn invalid_timezone_is_rejected() {
    clear_env();
    env::set_var("SCHEDULER_TIMEZONE", "Mars/Olympus_Mons");
    assert!(ServiceConfig::from_env().is_err());
    clear_env();
}
