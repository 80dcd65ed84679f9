//! TestLedgerBuilder - Fluent API for configuring the in-process ledger

use anyhow::{Context, Result};
use log::debug;
use sett_common::{
    address::Address,
    amount::Amount,
    contracts::{Controller, Erc20, Strategy},
    ChainClient,
};

use super::ledger::{LedgerState, TestLedger};
use super::{ether, Accounts, Contracts};

/// Builder for [`TestLedger`] instances
///
/// # Example
///
/// ```rust,ignore
/// let ledger = TestLedgerBuilder::new()
///     .with_performance_fees(0, 0)
///     .with_tendable(true)
///     .build()
///     .await?;
/// ```
pub struct TestLedgerBuilder {
    contracts: Contracts,
    accounts: Accounts,
    /// Want minted to each account before wiring
    want_balances: Vec<(Address, Amount)>,
    performance_fee_strategist: Amount,
    performance_fee_governance: Amount,
    withdrawal_fee: Amount,
    reward_apr_bps: Amount,
    tendable: bool,
    swap_rate_bps: Amount,
    router_liquidity: Amount,
    stuck_token: Amount,
}

impl Default for TestLedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestLedgerBuilder {
    /// Create new builder with defaults
    ///
    /// Default configuration:
    /// - deployer holds 1,000 want
    /// - 10% strategist fee, 10% governance fee, 0.5% withdrawal fee
    /// - 20% reward APR, rewards swap 1:1 into want
    /// - strategy is not tendable
    pub fn new() -> Self {
        let accounts = Accounts::default();
        Self {
            contracts: Contracts::default(),
            accounts,
            want_balances: vec![(accounts.deployer, ether(1_000))],
            performance_fee_strategist: Amount::from(1_000),
            performance_fee_governance: Amount::from(1_000),
            withdrawal_fee: Amount::from(50),
            reward_apr_bps: Amount::from(2_000),
            tendable: false,
            swap_rate_bps: Amount::from(10_000),
            router_liquidity: ether(1_000_000),
            stuck_token: Amount::zero(),
        }
    }

    /// Mint `amount` of want to `account`. Repeated calls accumulate.
    pub fn with_want_balance(mut self, account: Address, amount: Amount) -> Self {
        self.want_balances.push((account, amount));
        self
    }

    pub fn with_performance_fees(self, strategist_bps: u64, governance_bps: u64) -> Self {
        self.with_performance_fee_strategist(strategist_bps)
            .with_performance_fee_governance(governance_bps)
    }

    pub fn with_performance_fee_strategist(mut self, bps: u64) -> Self {
        self.performance_fee_strategist = Amount::from(bps);
        self
    }

    pub fn with_performance_fee_governance(mut self, bps: u64) -> Self {
        self.performance_fee_governance = Amount::from(bps);
        self
    }

    pub fn with_withdrawal_fee(mut self, bps: u64) -> Self {
        self.withdrawal_fee = Amount::from(bps);
        self
    }

    /// Yearly staking reward rate, in basis points of the staked amount
    pub fn with_reward_apr_bps(mut self, bps: u64) -> Self {
        self.reward_apr_bps = Amount::from(bps);
        self
    }

    /// A tendable strategy leaves harvested want idle until `tend()`
    pub fn with_tendable(mut self, tendable: bool) -> Self {
        self.tendable = tendable;
        self
    }

    /// Want received per reward token swapped, in basis points
    pub fn with_swap_rate_bps(mut self, bps: u64) -> Self {
        self.swap_rate_bps = Amount::from(bps);
        self
    }

    pub fn with_router_liquidity(mut self, amount: Amount) -> Self {
        self.router_liquidity = amount;
        self
    }

    /// Unprotected tokens stuck in the strategy at start
    pub fn with_stuck_token(mut self, amount: Amount) -> Self {
        self.stuck_token = amount;
        self
    }

    /// Build the ledger and wire the controller, vault and strategy
    ///
    /// # Errors
    ///
    /// Returns an error if any wiring call reverts (for example a fee above
    /// the strategy maximum).
    pub async fn build(self) -> Result<TestLedger> {
        let c = self.contracts;
        let a = self.accounts;

        let mut state = LedgerState::new(c, a);
        state.strategy.tendable = self.tendable;
        state.staking.apr_bps = self.reward_apr_bps;
        state.router.rate_bps = self.swap_rate_bps;
        let ledger = TestLedger::from_state(state);

        for (account, amount) in &self.want_balances {
            ledger.mint(c.want, *account, *amount)?;
        }
        ledger.mint(c.want, c.router, self.router_liquidity)?;
        ledger.mint(c.stuck, c.strategy, self.stuck_token)?;

        let controller = Controller(c.controller);
        let strategy = Strategy(c.strategy);
        let wiring = [
            controller.set_vault(c.want, c.vault),
            controller.approve_strategy(c.want, c.strategy),
            controller.set_strategy(c.want, c.strategy),
            strategy.set_performance_fee_strategist(self.performance_fee_strategist),
            strategy.set_performance_fee_governance(self.performance_fee_governance),
            strategy.set_withdrawal_fee(self.withdrawal_fee),
        ];
        for call in wiring {
            let description = call.to_string();
            ledger
                .send(call, a.governance)
                .await
                .with_context(|| format!("Wiring call {} failed", description))?;
        }

        let want = Erc20(c.want);
        for (account, _) in &self.want_balances {
            ledger
                .send(want.approve(c.vault, Amount::MAX), *account)
                .await
                .context("Failed to approve the vault")?;
        }

        debug!(
            "Built test ledger: {} funded accounts, tendable={}",
            self.want_balances.len(),
            self.tendable
        );
        Ok(ledger)
    }
}
