#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! YAML scenarios: parsing of the bundled files and full runs against the
//! in-process ledger

use sett_testing_framework::prelude::*;
use sett_testing_framework::scenarios::{load_scenario, Step};

const HARVEST_AFTER_YEAR: &str = include_str!("scenarios/harvest_after_year.yaml");
const CHECKPOINT_RESTORE: &str = include_str!("scenarios/checkpoint_restore.yaml");
const MIGRATE_STRATEGY: &str = include_str!("scenarios/migrate_strategy.yaml");

fn init_logger() {
    let _ = env_logger::Builder::new().is_test(true).try_init();
}

#[test]
fn test_parse_bundled_scenarios() {
    for yaml in [HARVEST_AFTER_YEAR, CHECKPOINT_RESTORE, MIGRATE_STRATEGY] {
        let scenario = parse_scenario(yaml).expect("Failed to parse");
        assert!(!scenario.steps.is_empty());
        assert_eq!(scenario.accounts.len(), 1);
    }

    let scenario = parse_scenario(HARVEST_AFTER_YEAR).unwrap();
    assert_eq!(scenario.name, "Harvest after a year");
    assert_eq!(scenario.ledger.performance_fee_governance, Some(1000));
    assert_eq!(scenario.accounts[0].want.0, ether(100));
    assert_eq!(scenario.steps[3], Step::AdvanceTime { seconds: YEAR_SECONDS });
}

#[test]
fn test_parse_rejects_unknown_action() {
    let yaml = r#"
name: "bad"
steps:
  - action: mine_block
"#;
    assert!(parse_scenario(yaml).is_err());
}

#[test]
fn test_parse_rejects_unknown_ledger_setting() {
    let yaml = r#"
name: "bad"
ledger:
  block_reward: 5
steps:
  - action: earn
    from: keeper
"#;
    assert!(parse_scenario(yaml).is_err());
}

#[test]
fn test_parse_rejects_expect_revert_on_non_operation() {
    let yaml = r#"
name: "bad"
steps:
  - action: expect_revert
    step:
      action: advance_time
      seconds: 10
"#;
    let err = parse_scenario(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("cannot revert"));
}

#[tokio::test]
async fn test_load_scenario_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.yaml");
    tokio::fs::write(&path, CHECKPOINT_RESTORE).await.unwrap();

    let scenario = load_scenario(&path).await.unwrap();
    assert_eq!(scenario.name, "Checkpoint and restore");

    assert!(load_scenario(dir.path().join("missing.yaml")).await.is_err());
}

#[tokio::test]
async fn test_run_harvest_after_year() {
    init_logger();
    let sink = BufferSink::new();
    let mut executor = ScenarioExecutor::with_config(HarnessConfig::default(), Arc::new(sink.clone()));

    let report = executor
        .execute(parse_scenario(HARVEST_AFTER_YEAR).unwrap())
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.steps_executed, 8);

    let kinds: Vec<OperationKind> = report.records.iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        vec![OperationKind::Deposit, OperationKind::Earn, OperationKind::Harvest]
    );
    assert!(report
        .records
        .iter()
        .all(|r| r.state() == RecordState::Verified));

    assert!(report
        .log
        .iter()
        .any(|line| line.contains("reverted as expected: onlyAuthorizedActors")));
    assert!(sink.contents().contains("harvest() Harvest State"));
}

#[tokio::test]
async fn test_run_checkpoint_restore() {
    init_logger();
    let mut executor = ScenarioExecutor::new();
    let report = executor
        .execute(parse_scenario(CHECKPOINT_RESTORE).unwrap())
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.records.len(), 3);
    assert!(executor.get_log().iter().any(|l| l.contains("Restored checkpoint 'funded'")));
}

#[tokio::test]
async fn test_run_migrate_strategy() {
    init_logger();
    let mut executor = ScenarioExecutor::new();
    let report = executor
        .execute(parse_scenario(MIGRATE_STRATEGY).unwrap())
        .await
        .unwrap();
    assert!(report.success);

    let snapshot = executor.manager().unwrap().snapshot().await.unwrap();
    assert!(snapshot.amount(STRATEGY_BALANCE_OF).unwrap().is_zero());
}

#[tokio::test]
async fn test_failed_assertion_names_the_step() {
    init_logger();
    let yaml = r#"
name: "Wrong expectation"
accounts:
  - name: "alice"
    want: "10 ether"
steps:
  - action: deposit
    from: alice
    amount: "10 ether"
  - action: assert_balance
    entity: sett
    token: want
    eq: "11 ether"
"#;
    let mut executor = ScenarioExecutor::new();
    let err = executor.execute(parse_scenario(yaml).unwrap()).await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Failed at step 2 (assert_balance)"));
    assert!(message.contains("Balance assertion failed"));
}

#[tokio::test]
async fn test_expect_revert_on_success_fails() {
    init_logger();
    let yaml = r#"
name: "Deposit does not revert"
steps:
  - action: expect_revert
    step:
      action: deposit
      from: deployer
      amount: "1 ether"
"#;
    let mut executor = ScenarioExecutor::new();
    let err = executor.execute(parse_scenario(yaml).unwrap()).await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Failed at step 1 (expect_revert)"));
    assert!(message.contains("Expected Deposit to revert"));
}

#[tokio::test]
async fn test_wrong_revert_reason_fails() {
    init_logger();
    let yaml = r#"
name: "Reason mismatch"
steps:
  - action: expect_revert
    reason: "onlyGovernance"
    step:
      action: earn
      from: random_user
"#;
    let mut executor = ScenarioExecutor::new();
    let err = executor.execute(parse_scenario(yaml).unwrap()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Expected revert 'onlyGovernance', got 'onlyAuthorizedActors'"));
}

#[tokio::test]
async fn test_unknown_signer_fails() {
    init_logger();
    let yaml = r#"
name: "Who is mallory"
steps:
  - action: earn
    from: mallory
"#;
    let mut executor = ScenarioExecutor::new();
    let err = executor.execute(parse_scenario(yaml).unwrap()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Account 'mallory' not found"));
}
