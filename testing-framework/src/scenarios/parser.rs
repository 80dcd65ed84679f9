//! YAML scenario format
//!
//! Amounts are strings (`"800"`, `"100 ether"`) so they are never mangled by
//! YAML number handling. Durations and basis points are plain integers.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sett_common::amount::{parse_amount, Amount};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Amount written as a decimal string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ScenarioAmount(pub Amount);

impl TryFrom<String> for ScenarioAmount {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_amount(&value)
            .map(ScenarioAmount)
            .map_err(|e| e.to_string())
    }
}

/// Share count for a withdraw step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SharesSpec {
    All,
    Half,
    Exact(Amount),
}

impl FromStr for SharesSpec {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "all" => Ok(SharesSpec::All),
            "half" => Ok(SharesSpec::Half),
            other => parse_amount(other)
                .map(SharesSpec::Exact)
                .map_err(|e| e.to_string()),
        }
    }
}

impl TryFrom<String> for SharesSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ledger parameters; anything omitted keeps the builder default
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSettings {
    pub performance_fee_strategist: Option<u64>,
    pub performance_fee_governance: Option<u64>,
    pub withdrawal_fee: Option<u64>,
    pub reward_apr_bps: Option<u64>,
    pub swap_rate_bps: Option<u64>,
    pub tendable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioAccount {
    pub name: String,
    /// Want minted to the account before the first step
    pub want: ScenarioAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Deposit {
        from: String,
        amount: Option<ScenarioAmount>,
        /// Fraction of the signer's want balance, in basis points
        fraction_bps: Option<u64>,
    },
    Withdraw {
        from: String,
        shares: SharesSpec,
    },
    WithdrawAll {
        from: String,
    },
    Earn {
        from: String,
    },
    Tend {
        from: String,
    },
    Harvest {
        from: String,
    },
    Migrate {
        #[serde(default = "governance")]
        from: String,
    },
    AdvanceTime {
        seconds: u64,
    },
    Checkpoint {
        name: String,
    },
    Restore {
        name: String,
    },
    /// Run `step` and require it to revert, optionally with `reason`
    ExpectRevert {
        reason: Option<String>,
        step: Box<Step>,
    },
    AssertBalance {
        entity: String,
        token: String,
        eq: Option<ScenarioAmount>,
        gt: Option<ScenarioAmount>,
        gte: Option<ScenarioAmount>,
        lt: Option<ScenarioAmount>,
        lte: Option<ScenarioAmount>,
    },
}

fn governance() -> String {
    "governance".to_string()
}

impl Step {
    /// Steps that go through the harness and produce an operation record
    pub fn is_operation(&self) -> bool {
        matches!(
            self,
            Step::Deposit { .. }
                | Step::Withdraw { .. }
                | Step::WithdrawAll { .. }
                | Step::Earn { .. }
                | Step::Tend { .. }
                | Step::Harvest { .. }
                | Step::Migrate { .. }
        )
    }

    pub fn action(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::Withdraw { .. } => "withdraw",
            Step::WithdrawAll { .. } => "withdraw_all",
            Step::Earn { .. } => "earn",
            Step::Tend { .. } => "tend",
            Step::Harvest { .. } => "harvest",
            Step::Migrate { .. } => "migrate",
            Step::AdvanceTime { .. } => "advance_time",
            Step::Checkpoint { .. } => "checkpoint",
            Step::Restore { .. } => "restore",
            Step::ExpectRevert { .. } => "expect_revert",
            Step::AssertBalance { .. } => "assert_balance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestScenario {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub accounts: Vec<ScenarioAccount>,
    pub steps: Vec<Step>,
}

/// Parse and validate a scenario
pub fn parse_scenario(yaml: &str) -> Result<TestScenario> {
    let scenario: TestScenario =
        serde_yaml::from_str(yaml).context("Failed to parse scenario YAML")?;
    validate(&scenario).with_context(|| format!("Invalid scenario '{}'", scenario.name))?;
    Ok(scenario)
}

pub async fn load_scenario(path: impl AsRef<Path>) -> Result<TestScenario> {
    let path = path.as_ref();
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    parse_scenario(&yaml)
}

fn validate(scenario: &TestScenario) -> Result<()> {
    if scenario.steps.is_empty() {
        bail!("scenario has no steps");
    }

    let mut names = HashSet::new();
    for account in &scenario.accounts {
        if !names.insert(account.name.as_str()) {
            bail!("account '{}' is declared twice", account.name);
        }
    }

    let mut checkpoints = HashSet::new();
    for (idx, step) in scenario.steps.iter().enumerate() {
        validate_step(step, &mut checkpoints).with_context(|| format!("step {}", idx + 1))?;
    }
    Ok(())
}

fn validate_step<'a>(step: &'a Step, checkpoints: &mut HashSet<&'a str>) -> Result<()> {
    match step {
        Step::Deposit {
            amount,
            fraction_bps,
            ..
        } => match (amount, fraction_bps) {
            (Some(_), None) => Ok(()),
            (None, Some(bps)) if *bps <= 10_000 => Ok(()),
            (None, Some(bps)) => bail!("fraction_bps {} exceeds 10000", bps),
            _ => bail!("deposit needs exactly one of 'amount' or 'fraction_bps'"),
        },
        Step::Checkpoint { name } => {
            checkpoints.insert(name.as_str());
            Ok(())
        }
        Step::Restore { name } => {
            if !checkpoints.contains(name.as_str()) {
                bail!("restore of undeclared checkpoint '{}'", name);
            }
            Ok(())
        }
        Step::ExpectRevert { step, .. } => {
            if !step.is_operation() {
                bail!("expect_revert wraps '{}', which cannot revert", step.action());
            }
            validate_step(step, checkpoints)
        }
        Step::AssertBalance {
            eq, gt, gte, lt, lte, ..
        } => {
            if eq.is_none() && gt.is_none() && gte.is_none() && lt.is_none() && lte.is_none() {
                bail!("assert_balance needs at least one of eq, gt, gte, lt, lte");
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
