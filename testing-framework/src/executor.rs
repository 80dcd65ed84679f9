//! Operation executor.
//!
//! One run is: snapshot before, the action (the only mutation of external
//! state), snapshot after, resolver assertions. The record moves through
//! `Created -> SnapshottedBefore -> Executed -> SnapshottedAfter ->
//! Verified | Failed` and never skips a state. A failing action is returned
//! unchanged and no after-snapshot is taken. A failing assertion is printed
//! (and written as an artifact when configured) before it propagates.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use sett_common::{address::Address, amount::Amount, ChainError, Receipt};
use std::future::Future;

use crate::config::HarnessConfig;
use crate::error::{CheckError, CheckResult, ConfigError, HarnessError, InvariantViolation};
use crate::invariants::{balance, check_zero, scalar};
use crate::report::ReportPrinter;
use crate::snapshot::keys::{ENTITY_STRATEGY, STRATEGY_BALANCE_OF, TOKEN_WANT};
use crate::snapshot::{Snapshot, SnapshotEngine, SnapshotPlan};
use crate::utilities::artifacts::FailureArtifact;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
pub enum OperationKind {
    Deposit,
    Withdraw,
    WithdrawAll,
    Earn,
    Harvest,
    Tend,
    Migrate,
}

impl OperationKind {
    /// Kinds after which the strategy must hold nothing
    pub fn empties_strategy(&self) -> bool {
        matches!(self, OperationKind::WithdrawAll | OperationKind::Migrate)
    }
}

/// Inputs of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationParams {
    /// Account that signs the call
    pub from: Address,
    /// Entity name `from` is registered under
    pub actor: Option<String>,
    /// Deposit amount or withdrawn shares
    pub amount: Option<Amount>,
}

impl OperationParams {
    pub fn new(from: Address) -> Self {
        Self {
            from,
            actor: None,
            amount: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum RecordState {
    Created,
    SnapshottedBefore,
    Executed,
    SnapshottedAfter,
    Verified,
    Failed,
}

impl RecordState {
    fn can_advance_to(self, next: RecordState) -> bool {
        use RecordState::*;
        matches!(
            (self, next),
            (Created, SnapshottedBefore)
                | (SnapshottedBefore, Executed)
                | (Executed, SnapshottedAfter)
                | (SnapshottedAfter, Verified)
                | (SnapshottedAfter, Failed)
        )
    }
}

/// Everything known about one operation. Lives in memory only.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    kind: OperationKind,
    params: OperationParams,
    state: RecordState,
    before: Option<Snapshot>,
    after: Option<Snapshot>,
    receipt: Option<Receipt>,
}

impl OperationRecord {
    pub fn new(kind: OperationKind, params: OperationParams) -> Self {
        Self {
            kind,
            params,
            state: RecordState::Created,
            before: None,
            after: None,
            receipt: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn params(&self) -> &OperationParams {
        &self.params
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn before(&self) -> Option<&Snapshot> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Snapshot> {
        self.after.as_ref()
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    fn advance(&mut self, next: RecordState) -> Result<(), ConfigError> {
        if !self.state.can_advance_to(next) {
            return Err(ConfigError::IllegalTransition {
                from: self.state.into(),
                to: next.into(),
            });
        }
        trace!("{} record: {} -> {}", self.kind, self.state, next);
        self.state = next;
        Ok(())
    }

    fn snapshotted_before(&mut self, snapshot: Snapshot) -> Result<(), ConfigError> {
        self.advance(RecordState::SnapshottedBefore)?;
        self.before = Some(snapshot);
        Ok(())
    }

    fn executed(&mut self, receipt: Receipt) -> Result<(), ConfigError> {
        self.advance(RecordState::Executed)?;
        self.receipt = Some(receipt);
        Ok(())
    }

    fn snapshotted_after(&mut self, snapshot: Snapshot) -> Result<(), ConfigError> {
        self.advance(RecordState::SnapshottedAfter)?;
        self.after = Some(snapshot);
        Ok(())
    }
}

/// Checks that hold for a kind regardless of the resolver
pub fn default_checks(kind: OperationKind, before: &Snapshot, after: &Snapshot) -> CheckResult {
    if !kind.empties_strategy() {
        return Ok(());
    }
    let invariant = match kind {
        OperationKind::Migrate => "migrate.strategyEmpty",
        _ => "withdrawAll.strategyEmpty",
    };
    check_zero(invariant, before, after, balance(ENTITY_STRATEGY, TOKEN_WANT))?;
    check_zero(invariant, before, after, scalar(STRATEGY_BALANCE_OF))
}

/// Shape check, resolver hook, then the per-kind default checks. Only called
/// once the after-snapshot is recorded.
fn evaluate<H>(record: &OperationRecord, hook: H) -> CheckResult
where
    H: FnOnce(&Snapshot, &Snapshot, &Receipt, &OperationParams) -> CheckResult,
{
    match (&record.before, &record.after, &record.receipt) {
        (Some(before), Some(after), Some(receipt)) => before
            .check_same_shape(after)
            .map_err(CheckError::from)
            .and_then(|_| hook(before, after, receipt, &record.params))
            .and_then(|_| default_checks(record.kind, before, after)),
        _ => Err(ConfigError::IllegalTransition {
            from: record.state.into(),
            to: RecordState::Verified.into(),
        }
        .into()),
    }
}

pub struct OperationExecutor {
    engine: SnapshotEngine,
    printer: ReportPrinter,
    config: HarnessConfig,
}

impl OperationExecutor {
    pub fn new(engine: SnapshotEngine, printer: ReportPrinter, config: HarnessConfig) -> Self {
        Self {
            engine,
            printer,
            config,
        }
    }

    pub fn engine(&self) -> &SnapshotEngine {
        &self.engine
    }

    pub fn printer(&self) -> &ReportPrinter {
        &self.printer
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one operation end to end.
    ///
    /// `hook` receives `(before, after, receipt, params)`; its failure
    /// propagates after the diff has been reported.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Read`] if either snapshot fails
    /// - [`HarnessError::Operation`] if `action` fails (no after-snapshot)
    /// - [`HarnessError::Config`] if the hook could not be evaluated
    /// - [`HarnessError::Invariant`] if an invariant does not hold
    pub async fn run<A, Fut, H>(
        &mut self,
        kind: OperationKind,
        plan: &SnapshotPlan,
        params: OperationParams,
        action: A,
        hook: H,
    ) -> Result<OperationRecord, HarnessError>
    where
        A: FnOnce() -> Fut,
        Fut: Future<Output = Result<Receipt, ChainError>>,
        H: FnOnce(&Snapshot, &Snapshot, &Receipt, &OperationParams) -> CheckResult,
    {
        debug!("{} starting", kind);
        let mut record = OperationRecord::new(kind, params);

        let before = self.engine.take(plan).await?;
        record.snapshotted_before(before)?;

        let receipt = action()
            .await
            .map_err(|source| HarnessError::Operation { kind, source })?;
        record.executed(receipt)?;

        let after = self.engine.take(plan).await?;
        record.snapshotted_after(after)?;

        let outcome = evaluate(&record, hook);

        match outcome {
            Ok(()) => {
                record.advance(RecordState::Verified)?;
                if self.config.print_diffs {
                    if let (Some(before), Some(after)) = (&record.before, &record.after) {
                        self.printer.print_compare(&kind.to_string(), before, after);
                    }
                }
                debug!("{} verified", kind);
                Ok(record)
            }
            Err(CheckError::Config(err)) => {
                record.advance(RecordState::Failed)?;
                Err(err.into())
            }
            Err(CheckError::Violation(violation)) => {
                record.advance(RecordState::Failed)?;
                self.report_failure(&record, &violation).await;
                Err(HarnessError::Invariant {
                    kind,
                    violation,
                    record: Box::new(record),
                })
            }
        }
    }

    async fn report_failure(&self, record: &OperationRecord, violation: &InvariantViolation) {
        warn!("{} failed invariant '{}': {}", record.kind, violation.invariant, violation.message);

        if self.config.print_on_failure {
            if let (Some(before), Some(after)) = (record.before(), record.after()) {
                self.printer.print_failure(record.kind, violation, before, after);
            }
        }

        if let Some(dir) = &self.config.artifact_dir {
            let artifact = FailureArtifact::from_record(record, violation);
            match artifact.save(dir).await {
                Ok(path) => debug!("Failure artifact written to {}", path.display()),
                Err(e) => warn!("Could not write failure artifact: {:#}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::keys::SETT_BALANCE;
    use crate::snapshot::BalanceKey;
    use indexmap::IndexMap;
    use sett_common::address::address_from_index;
    use sett_common::Value;

    fn strategy_state(want: u64, balance_of: u64) -> Snapshot {
        let mut balances = IndexMap::new();
        balances.insert(BalanceKey::new(ENTITY_STRATEGY, TOKEN_WANT), Amount::from(want));
        let mut scalars = IndexMap::new();
        scalars.insert(STRATEGY_BALANCE_OF.to_string(), Value::from(balance_of));
        Snapshot::from_parts(balances, scalars)
    }

    fn snapshotted(kind: OperationKind, before: Snapshot, after: Snapshot) -> OperationRecord {
        let mut record = OperationRecord::new(kind, OperationParams::new(address_from_index(1)));
        record.snapshotted_before(before).unwrap();
        record
            .executed(Receipt {
                tx_index: 1,
                block_number: 1,
                from: address_from_index(1),
                events: Vec::new(),
            })
            .unwrap();
        record.snapshotted_after(after).unwrap();
        record
    }

    fn violated(result: CheckResult) -> &'static str {
        match result {
            Err(CheckError::Violation(violation)) => violation.invariant,
            other => panic!("expected an invariant violation, got {:?}", other),
        }
    }

    #[test]
    fn test_record_state_machine_has_no_shortcuts() {
        use RecordState::*;
        assert!(Created.can_advance_to(SnapshottedBefore));
        assert!(!Created.can_advance_to(Executed));
        assert!(!SnapshottedBefore.can_advance_to(SnapshottedAfter));
        assert!(!Executed.can_advance_to(Verified));
        assert!(SnapshottedAfter.can_advance_to(Failed));
        assert!(!Verified.can_advance_to(Failed));
    }

    #[test]
    fn test_illegal_transition_is_reported() {
        let mut record = OperationRecord::new(
            OperationKind::Deposit,
            OperationParams::new(sett_common::address::address_from_index(1)),
        );
        let err = record.advance(RecordState::Verified).unwrap_err();
        assert_eq!(
            err,
            ConfigError::IllegalTransition {
                from: "Created",
                to: "Verified"
            }
        );
        assert_eq!(record.state(), RecordState::Created);
    }

    #[test]
    fn test_only_exits_empty_the_strategy() {
        assert!(OperationKind::WithdrawAll.empties_strategy());
        assert!(OperationKind::Migrate.empties_strategy());
        assert!(!OperationKind::Withdraw.empties_strategy());
    }

    #[test]
    fn test_migrate_leaving_want_in_strategy_fails() {
        let result = default_checks(OperationKind::Migrate, &strategy_state(10, 10), &strategy_state(3, 0));
        assert_eq!(violated(result), "migrate.strategyEmpty");
    }

    #[test]
    fn test_withdraw_all_leaving_strategy_balance_fails() {
        let result = default_checks(OperationKind::WithdrawAll, &strategy_state(10, 10), &strategy_state(0, 4));
        assert_eq!(violated(result), "withdrawAll.strategyEmpty");
    }

    #[test]
    fn test_other_kinds_ignore_strategy_holdings() {
        let state = strategy_state(10, 10);
        assert!(default_checks(OperationKind::Deposit, &state, &state).is_ok());
        assert!(default_checks(OperationKind::Migrate, &state, &strategy_state(0, 0)).is_ok());
    }

    #[test]
    fn test_shape_mismatch_is_a_config_error() {
        let grown = Snapshot::from_parts(
            [(BalanceKey::new(ENTITY_STRATEGY, TOKEN_WANT), Amount::zero())].into_iter().collect(),
            [
                (STRATEGY_BALANCE_OF.to_string(), Value::from(0u64)),
                (SETT_BALANCE.to_string(), Value::from(0u64)),
            ]
            .into_iter()
            .collect(),
        );
        let mut record = snapshotted(OperationKind::Deposit, strategy_state(0, 0), grown);

        let mut hook_ran = false;
        let result = evaluate(&record, |_, _, _, _| {
            hook_ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(CheckError::Config(ConfigError::ShapeMismatch(_)))));
        assert!(!hook_ran);
        record.advance(RecordState::Failed).unwrap();
        assert_eq!(record.state(), RecordState::Failed);
    }

    #[test]
    fn test_default_checks_run_after_hook() {
        let record = snapshotted(OperationKind::Migrate, strategy_state(10, 10), strategy_state(1, 0));
        assert_eq!(violated(evaluate(&record, |_, _, _, _| Ok(()))), "migrate.strategyEmpty");

        let record = snapshotted(OperationKind::Migrate, strategy_state(10, 10), strategy_state(1, 0));
        let result = evaluate(&record, |_, _, _, _| Err(InvariantViolation::new("hook", "first").into()));
        assert_eq!(violated(result), "hook");
    }
}
