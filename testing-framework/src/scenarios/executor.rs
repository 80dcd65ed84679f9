//! YAML scenario execution engine
//!
//! Runs a parsed [`TestScenario`] against a fresh [`TestLedger`] through the
//! same [`SnapshotManager`] entry points a hand-written test would use, so
//! every operation step is checked by the staking resolver.
//!
//! # Example
//!
//! ```rust,ignore
//! use sett_testing_framework::scenarios::{parse_scenario, ScenarioExecutor};
//!
//! let yaml = r#"
//! name: "Deposit"
//! accounts:
//!   - name: "alice"
//!     want: "100 ether"
//! steps:
//!   - action: deposit
//!     from: alice
//!     amount: "80 ether"
//!   - action: assert_balance
//!     entity: sett
//!     token: want
//!     eq: "80 ether"
//! "#;
//!
//! let scenario = parse_scenario(yaml)?;
//! let mut executor = ScenarioExecutor::new();
//! let report = executor.execute(scenario).await?;
//!
//! assert!(report.success);
//! ```

use super::parser::{ScenarioAmount, SharesSpec, Step, TestScenario};
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::executor::OperationRecord;
use crate::manager::SnapshotManager;
use crate::report::{DiagnosticSink, LogSink};
use crate::tier1_component::{staking_resolver, Accounts, TestLedger, TestLedgerBuilder};
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use sett_common::{
    address::{address_from_index, Address},
    amount::{bps_of, Amount},
    contracts::{Erc20, Vault},
    ChainClient, Checkpoint,
};
use std::collections::HashMap;
use std::sync::Arc;

/// First address index handed to scenario-declared accounts
const SCENARIO_ACCOUNT_BASE: u64 = 1_000;

/// Outcome of one scenario run
#[derive(Debug)]
pub struct ExecutionReport {
    pub scenario_name: String,
    pub steps_executed: usize,
    pub success: bool,
    pub log: Vec<String>,
    /// Verified operation records, in execution order
    pub records: Vec<OperationRecord>,
}

/// Scenario executor that runs parsed YAML scenarios
pub struct ScenarioExecutor {
    config: HarnessConfig,
    sink: Arc<dyn DiagnosticSink>,
    ledger: Option<Arc<TestLedger>>,
    manager: Option<SnapshotManager>,
    /// Named scenario accounts (name -> address)
    accounts: IndexMap<String, Address>,
    checkpoints: HashMap<String, Checkpoint>,
    records: Vec<OperationRecord>,
    log: Vec<String>,
    /// Current step number (1-indexed)
    current_step: usize,
}

impl ScenarioExecutor {
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default(), Arc::new(LogSink))
    }

    pub fn with_config(config: HarnessConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            sink,
            ledger: None,
            manager: None,
            accounts: IndexMap::new(),
            checkpoints: HashMap::new(),
            records: Vec::new(),
            log: Vec::new(),
            current_step: 0,
        }
    }

    /// Execute a complete scenario
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ledger setup fails
    /// - Any operation reverts outside of `expect_revert`
    /// - Any invariant or assertion fails
    pub async fn execute(&mut self, scenario: TestScenario) -> Result<ExecutionReport> {
        self.log.clear();
        self.records.clear();
        self.checkpoints.clear();
        self.current_step = 0;

        self.log(format!("Starting scenario: {}", scenario.name));
        if let Some(desc) = &scenario.description {
            self.log(format!("Description: {}", desc));
        }

        self.setup(&scenario).await?;

        for (idx, step) in scenario.steps.iter().enumerate() {
            self.current_step = idx + 1;
            self.log(format!("--- Step {}: {} ---", self.current_step, step.action()));

            self.execute_step(step)
                .await
                .with_context(|| format!("Failed at step {} ({})", self.current_step, step.action()))?;
        }

        self.log("=== Scenario completed successfully ===".to_string());
        info!("Scenario '{}' passed ({} steps)", scenario.name, self.current_step);

        Ok(ExecutionReport {
            scenario_name: scenario.name,
            steps_executed: self.current_step,
            success: true,
            log: self.log.clone(),
            records: std::mem::take(&mut self.records),
        })
    }

    async fn setup(&mut self, scenario: &TestScenario) -> Result<()> {
        let settings = &scenario.ledger;
        let mut builder = TestLedgerBuilder::new();
        if let Some(bps) = settings.performance_fee_strategist {
            builder = builder.with_performance_fee_strategist(bps);
        }
        if let Some(bps) = settings.performance_fee_governance {
            builder = builder.with_performance_fee_governance(bps);
        }
        if let Some(bps) = settings.withdrawal_fee {
            builder = builder.with_withdrawal_fee(bps);
        }
        if let Some(bps) = settings.reward_apr_bps {
            builder = builder.with_reward_apr_bps(bps);
        }
        if let Some(bps) = settings.swap_rate_bps {
            builder = builder.with_swap_rate_bps(bps);
        }
        if let Some(tendable) = settings.tendable {
            builder = builder.with_tendable(tendable);
        }

        self.accounts.clear();
        for (idx, account) in scenario.accounts.iter().enumerate() {
            let address = address_from_index(SCENARIO_ACCOUNT_BASE + idx as u64);
            self.accounts.insert(account.name.clone(), address);
            builder = builder.with_want_balance(address, account.want.0);
            self.log(format!("  Account '{}': want={}", account.name, account.want.0));
        }

        let ledger = Arc::new(builder.build().await.context("Failed to build test ledger")?);
        let resolver = staking_resolver(ledger.deployment())?;
        let mut manager = SnapshotManager::new(
            ledger.clone(),
            resolver,
            self.config.clone(),
            self.sink.clone(),
        )?;
        if !self.accounts.contains_key("deployer") {
            manager.register_account("deployer", ledger.accounts().deployer)?;
        }
        for (name, address) in &self.accounts {
            manager.register_account(name.clone(), *address)?;
        }

        self.ledger = Some(ledger);
        self.manager = Some(manager);
        self.log(format!("Ledger ready: {} scenario accounts", self.accounts.len()));
        Ok(())
    }

    fn ledger(&self) -> Result<Arc<TestLedger>> {
        self.ledger.clone().context("Ledger not initialized")
    }

    /// Scenario account or well-known role
    fn resolve(&self, name: &str) -> Result<Address> {
        if let Some(address) = self.accounts.get(name) {
            return Ok(*address);
        }
        let roles = self.ledger()?.accounts();
        role_address(&roles, name).with_context(|| format!("Account '{}' not found", name))
    }

    async fn execute_step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::AdvanceTime { seconds } => {
                self.ledger()?.advance_time(*seconds).await?;
                self.log(format!("  Time advanced by {}s", seconds));
                Ok(())
            }
            Step::Checkpoint { name } => {
                let checkpoint = self.ledger()?.checkpoint().await?;
                self.checkpoints.insert(name.clone(), checkpoint);
                self.log(format!("  Checkpoint '{}' saved", name));
                Ok(())
            }
            Step::Restore { name } => {
                let checkpoint = *self
                    .checkpoints
                    .get(name)
                    .with_context(|| format!("Checkpoint '{}' not found", name))?;
                self.ledger()?.restore(checkpoint).await?;
                self.log(format!("  Restored checkpoint '{}'", name));
                Ok(())
            }
            Step::ExpectRevert { reason, step } => self.execute_expect_revert(reason.as_deref(), step).await,
            Step::AssertBalance {
                entity,
                token,
                eq,
                gt,
                gte,
                lt,
                lte,
            } => {
                self.execute_assert_balance(entity, token, [*eq, *gt, *gte, *lt, *lte])
                    .await
            }
            operation => {
                let record = self.execute_operation(operation).await??;
                self.log(format!("  {} verified", record.kind()));
                self.records.push(record);
                Ok(())
            }
        }
    }

    /// Outer error: the step could not be prepared. Inner result: the
    /// harness outcome of the operation itself.
    async fn execute_operation(
        &mut self,
        step: &Step,
    ) -> Result<Result<OperationRecord, HarnessError>> {
        let (op, from) = self.prepare_operation(step).await?;
        debug!("Scenario step {}: {:?}", self.current_step, op);

        let manager = self.manager.as_mut().context("Manager not initialized")?;
        Ok(match op {
            PreparedOp::Deposit(amount) => manager.sett_deposit(from, amount).await,
            PreparedOp::Withdraw(shares) => manager.sett_withdraw(from, shares).await,
            PreparedOp::WithdrawAll => manager.sett_withdraw_all(from).await,
            PreparedOp::Earn => manager.sett_earn(from).await,
            PreparedOp::Tend => manager.sett_tend(from).await,
            PreparedOp::Harvest => manager.sett_harvest(from).await,
            PreparedOp::Migrate => manager.migrate(from).await,
        })
    }

    /// Resolve the signer and any balance-dependent amount of an operation
    async fn prepare_operation(&self, step: &Step) -> Result<(PreparedOp, Address)> {
        let ledger = self.ledger()?;
        let contracts = ledger.contracts();
        let (op, from) = match step {
            Step::Deposit {
                from,
                amount,
                fraction_bps,
            } => {
                let from = self.resolve(from)?;
                let amount = match (amount, fraction_bps) {
                    (Some(amount), _) => amount.0,
                    (None, Some(bps)) => {
                        let held = read_amount(&ledger, Erc20(contracts.want), from).await?;
                        bps_of(held, Amount::from(*bps))
                    }
                    (None, None) => bail!("deposit has no amount"),
                };
                return Ok((PreparedOp::Deposit(amount), from));
            }
            Step::Withdraw { from, shares } => {
                let from = self.resolve(from)?;
                let held = read_amount(&ledger, Vault(contracts.vault).shares(), from).await?;
                let shares = match shares {
                    SharesSpec::All => held,
                    SharesSpec::Half => held / 2,
                    SharesSpec::Exact(shares) => *shares,
                };
                return Ok((PreparedOp::Withdraw(shares), from));
            }
            Step::WithdrawAll { from } => (PreparedOp::WithdrawAll, from),
            Step::Earn { from } => (PreparedOp::Earn, from),
            Step::Tend { from } => (PreparedOp::Tend, from),
            Step::Harvest { from } => (PreparedOp::Harvest, from),
            Step::Migrate { from } => (PreparedOp::Migrate, from),
            other => bail!("'{}' is not an operation", other.action()),
        };
        Ok((op, self.resolve(from)?))
    }

    async fn execute_expect_revert(&mut self, reason: Option<&str>, step: &Step) -> Result<()> {
        match self.execute_operation(step).await? {
            Ok(record) => bail!("Expected {} to revert, but it succeeded", record.kind()),
            Err(HarnessError::Operation { kind, source }) => match (reason, source.revert_reason()) {
                (None, Some(actual)) => {
                    self.log(format!("  {} reverted as expected: {}", kind, actual));
                    Ok(())
                }
                (Some(expected), Some(actual)) if actual.contains(expected) => {
                    self.log(format!("  {} reverted as expected: {}", kind, actual));
                    Ok(())
                }
                (Some(expected), Some(actual)) => {
                    bail!("Expected revert '{}', got '{}'", expected, actual)
                }
                (_, None) => Err(anyhow::Error::new(source)
                    .context(format!("{} failed without reverting", kind))),
            },
            Err(other) => Err(other.into()),
        }
    }

    async fn execute_assert_balance(
        &mut self,
        entity: &str,
        token: &str,
        bounds: [Option<ScenarioAmount>; 5],
    ) -> Result<()> {
        let manager = self.manager.as_ref().context("Manager not initialized")?;
        let snapshot = manager.snapshot().await?;
        let actual = snapshot.balance(entity, token)?;
        self.log(format!("Assert balance {}.{}: actual={}", entity, token, actual));

        let [eq, gt, gte, lt, lte] = bounds.map(|bound| bound.map(|b| b.0));
        if let Some(eq) = eq {
            if actual != eq {
                bail!("Balance assertion failed: expected {}, got {}", eq, actual);
            }
        }
        if let Some(gt) = gt {
            if actual <= gt {
                bail!("Balance {} <= {}", actual, gt);
            }
        }
        if let Some(gte) = gte {
            if actual < gte {
                bail!("Balance {} < {}", actual, gte);
            }
        }
        if let Some(lt) = lt {
            if actual >= lt {
                bail!("Balance {} >= {}", actual, lt);
            }
        }
        if let Some(lte) = lte {
            if actual > lte {
                bail!("Balance {} > {}", actual, lte);
            }
        }
        self.log("  Balance assertion holds".to_string());
        Ok(())
    }

    fn log(&mut self, message: String) {
        debug!("{}", message);
        self.log.push(message);
    }

    /// Get execution log
    pub fn get_log(&self) -> &[String] {
        &self.log
    }

    /// Manager of the last executed scenario
    pub fn manager(&self) -> Option<&SnapshotManager> {
        self.manager.as_ref()
    }
}

impl Default for ScenarioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum PreparedOp {
    Deposit(Amount),
    Withdraw(Amount),
    WithdrawAll,
    Earn,
    Tend,
    Harvest,
    Migrate,
}

fn role_address(roles: &Accounts, name: &str) -> Option<Address> {
    match name {
        "deployer" => Some(roles.deployer),
        "strategist" => Some(roles.strategist),
        "keeper" => Some(roles.keeper),
        "guardian" => Some(roles.guardian),
        "governance" => Some(roles.governance),
        "random_user" => Some(roles.random_user),
        "rewards" => Some(roles.rewards),
        _ => None,
    }
}

async fn read_amount(ledger: &TestLedger, token: Erc20, owner: Address) -> Result<Amount> {
    let value = ledger.call(&token.balance_of(owner)).await?;
    Ok(value.as_amount()?)
}
