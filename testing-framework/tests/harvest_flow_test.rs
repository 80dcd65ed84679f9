#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! End-to-end operation flows against the in-process ledger
//!
//! Every operation goes through the snapshot manager, so each test also
//! exercises the core accounting laws and the staking resolver hooks.

use sett_testing_framework::prelude::*;

fn init_logger() {
    let _ = env_logger::Builder::new().is_test(true).try_init();
}

struct Harness {
    ledger: Arc<TestLedger>,
    manager: SnapshotManager,
    sink: BufferSink,
}

async fn harness(builder: TestLedgerBuilder) -> Harness {
    init_logger();
    let ledger = Arc::new(builder.build().await.expect("ledger"));
    let resolver = staking_resolver(ledger.deployment()).expect("resolver");
    let sink = BufferSink::new();
    let mut manager = SnapshotManager::new(
        ledger.clone(),
        resolver,
        HarnessConfig::default(),
        Arc::new(sink.clone()),
    )
    .expect("manager");
    manager
        .register_account("deployer", ledger.accounts().deployer)
        .unwrap();
    Harness {
        ledger,
        manager,
        sink,
    }
}

fn diff(record: &OperationRecord) -> SnapshotDiff {
    record
        .before()
        .unwrap()
        .diff(record.after().unwrap())
        .unwrap()
}

/// Deposit 800, earn, let a year of rewards accrue
async fn funded_and_aged(h: &mut Harness) {
    let roles = h.ledger.accounts();
    h.manager.sett_deposit(roles.deployer, ether(800)).await.unwrap();
    h.manager.sett_earn(roles.keeper).await.unwrap();
    h.ledger.advance_time(YEAR_SECONDS).await.unwrap();
}

#[tokio::test]
async fn test_deposit_800_of_1000() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    let deployer = h.ledger.accounts().deployer;

    let record = h.manager.sett_deposit(deployer, ether(800)).await.unwrap();
    assert_eq!(record.state(), RecordState::Verified);

    let diff = diff(&record);
    assert_eq!(diff.balance("sett", "want"), Some(Delta::Increase(ether(800))));
    assert_eq!(diff.balance("deployer", "want"), Some(Delta::Decrease(ether(800))));
    // First deposit mints shares one to one
    assert_eq!(diff.balance("deployer", "sett"), Some(Delta::Increase(ether(800))));
    assert_eq!(diff.balance("staking", "want"), Some(Delta::Unchanged));
}

#[tokio::test]
async fn test_withdraw_after_earn_pays_withdrawal_fee() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    let roles = h.ledger.accounts();
    h.manager.sett_deposit(roles.deployer, ether(800)).await.unwrap();
    h.manager.sett_earn(roles.keeper).await.unwrap();

    let record = h.manager.sett_withdraw(roles.deployer, ether(800)).await.unwrap();
    let diff = diff(&record);
    assert_eq!(diff.balance("deployer", "sett"), Some(Delta::Decrease(ether(800))));

    // 760 was staked; 0.5% of it goes to governance rewards
    let fee = ether(760) / 200;
    assert_eq!(diff.balance("governanceRewards", "want"), Some(Delta::Increase(fee)));
    assert_eq!(
        diff.balance("deployer", "want"),
        Some(Delta::Increase(ether(800) - fee))
    );
}

#[tokio::test]
async fn test_harvest_pays_fees_and_prints_state() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    funded_and_aged(&mut h).await;
    let keeper = h.ledger.accounts().keeper;

    let record = h.manager.sett_harvest(keeper).await.unwrap();
    assert_eq!(record.state(), RecordState::Verified);

    let diff = diff(&record);
    assert!(matches!(diff.balance("strategist", "want"), Some(Delta::Increase(_))));
    assert!(matches!(diff.balance("governanceRewards", "want"), Some(Delta::Increase(_))));
    assert!(matches!(
        diff.scalar(SETT_PRICE_PER_FULL_SHARE),
        Some(ScalarDelta::Amount(Delta::Increase(_)))
    ));
    assert_eq!(diff.balance("strategy", "reward"), Some(Delta::Unchanged));

    // The strategy's own event is the second Harvest in the receipt
    let out = h.sink.contents();
    assert!(out.contains("harvest() Harvest State"));
    assert!(out.contains("harvested: "));
    assert!(!out.contains("harvested: <missing>"));
}

#[tokio::test]
async fn test_zero_fee_harvest_leaves_strategist_untouched() {
    let mut h = harness(TestLedgerBuilder::new().with_performance_fees(0, 0)).await;
    funded_and_aged(&mut h).await;

    let record = h.manager.sett_harvest(h.ledger.accounts().keeper).await.unwrap();
    assert_eq!(record.state(), RecordState::Verified);

    let diff = diff(&record);
    assert_eq!(diff.balance("strategist", "want"), Some(Delta::Unchanged));
    assert_eq!(diff.balance("governanceRewards", "want"), Some(Delta::Unchanged));
}

#[tokio::test]
async fn test_tend_stakes_pending_want() {
    let mut h = harness(TestLedgerBuilder::new().with_tendable(true)).await;
    funded_and_aged(&mut h).await;
    let keeper = h.ledger.accounts().keeper;

    // A tendable strategy keeps harvested want idle
    let harvest = h.manager.sett_harvest(keeper).await.unwrap();
    let pending = harvest
        .after()
        .unwrap()
        .amount(STRATEGY_BALANCE_OF_WANT)
        .unwrap();
    assert!(!pending.is_zero());

    let record = h.manager.sett_tend(keeper).await.unwrap();
    let diff = diff(&record);
    assert_eq!(diff.balance("strategy", "want"), Some(Delta::Decrease(pending)));
    assert_eq!(diff.balance("staking", "want"), Some(Delta::Increase(pending)));
}

#[tokio::test]
async fn test_tend_on_untendable_strategy_reverts() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    let err = h
        .manager
        .sett_tend(h.ledger.accounts().keeper)
        .await
        .unwrap_err();
    assert_eq!(err.revert_reason(), Some("not tendable"));
}

#[tokio::test]
async fn test_unauthorized_calls_propagate_revert() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    let random_user = h.ledger.accounts().random_user;
    h.manager
        .sett_deposit(h.ledger.accounts().deployer, ether(10))
        .await
        .unwrap();

    for result in [
        h.manager.sett_earn(random_user).await,
        h.manager.sett_harvest(random_user).await,
    ] {
        match result {
            Err(HarnessError::Operation { source, .. }) => {
                assert_eq!(source.revert_reason(), Some("onlyAuthorizedActors"))
            }
            other => panic!("expected a reverted operation, got {:?}", other),
        }
    }

    let err = h.manager.migrate(random_user).await.unwrap_err();
    assert_eq!(err.revert_reason(), Some("onlyGovernance"));
}

#[tokio::test]
async fn test_migrate_after_harvest_empties_strategy() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    funded_and_aged(&mut h).await;
    let roles = h.ledger.accounts();
    h.manager.sett_harvest(roles.keeper).await.unwrap();

    let record = h.manager.migrate(roles.governance).await.unwrap();
    assert_eq!(record.state(), RecordState::Verified);

    let after = record.after().unwrap();
    assert!(after.balance("strategy", "want").unwrap().is_zero());
    assert!(after.amount(STRATEGY_BALANCE_OF).unwrap().is_zero());
    assert!(matches!(diff(&record).balance("sett", "want"), Some(Delta::Increase(_))));
}

#[tokio::test]
async fn test_sole_depositor_withdraw_all() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    let roles = h.ledger.accounts();
    h.manager.sett_deposit(roles.deployer, ether(800)).await.unwrap();
    h.manager.sett_earn(roles.keeper).await.unwrap();

    let record = h.manager.sett_withdraw_all(roles.deployer).await.unwrap();
    let after = record.after().unwrap();
    assert!(after.balance("deployer", "sett").unwrap().is_zero());
    assert!(after.balance("strategy", "want").unwrap().is_zero());
    assert!(after.amount(SETT_TOTAL_SUPPLY).unwrap().is_zero());
}

#[tokio::test]
async fn test_withdraw_other() {
    let h = harness(TestLedgerBuilder::new().with_stuck_token(ether(5))).await;
    let roles = h.ledger.accounts();
    let reward = h.ledger.deployment().extra("reward").unwrap();

    // Protected tokens (want and reward) must not be recoverable; the stuck
    // token must move to the controller in full
    let unprotected = [h.ledger.contracts().stuck];
    h.manager
        .confirm_withdraw_other(roles.governance, &unprotected)
        .await
        .unwrap();

    // Recovering a protected token as an unprotected one is caught
    let err = h
        .manager
        .confirm_withdraw_other(roles.governance, &[reward])
        .await
        .unwrap_err();
    assert_eq!(err.revert_reason(), Some("_onlyNotProtectedTokens"));

    // Only governance may recover
    let err = h
        .manager
        .confirm_withdraw_other(roles.random_user, &unprotected)
        .await
        .unwrap_err();
    assert_eq!(err.revert_reason(), Some("onlyGovernance"));
}

#[tokio::test]
async fn test_checkpoint_isolates_scenarios() {
    let mut h = harness(TestLedgerBuilder::new()).await;
    let deployer = h.ledger.accounts().deployer;
    let checkpoint = h.ledger.checkpoint().await.unwrap();

    h.manager.sett_deposit(deployer, ether(100)).await.unwrap();
    h.ledger.restore(checkpoint).await.unwrap();

    let snapshot = h.manager.snapshot().await.unwrap();
    assert_eq!(snapshot.balance("deployer", "want").unwrap(), ether(1_000));
    assert!(snapshot.balance("deployer", "sett").unwrap().is_zero());
}
