//! In-process Sett ledger.
//!
//! A vault, a controller, a staking strategy, a staking pool paying a reward
//! token, and a router swapping the reward back into want. Every `send`
//! executes against a copy of the state and commits it only on success, so a
//! reverted call leaves no trace. Each committed call mines one block.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sett_common::{
    address::Address,
    amount::{bps_of, mul_div, Amount},
    config::*,
    contracts::{
        Call, ControllerCall, ControllerQuery, Query, StrategyCall, StrategyQuery, TokenCall,
        VaultCall, VaultQuery,
    },
    ChainClient, ChainError, Checkpoint, EventLog, Receipt, Value,
};
use std::collections::{HashMap, HashSet};

use super::{Accounts, Contracts};

pub const YEAR_SECONDS: u64 = 31_536_000;
pub const BLOCK_TIME: u64 = 13;

#[derive(Debug, Clone, Default)]
pub(crate) struct TokenState {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    supply: Amount,
}

impl TokenState {
    pub(crate) fn balance(&self, owner: &Address) -> Amount {
        self.balances.get(owner).copied().unwrap_or_default()
    }

    /// Balances never exceed the supply, so only the supply needs the check
    pub(crate) fn mint(&mut self, to: Address, amount: Amount) -> Result<(), ChainError> {
        let supply = self
            .supply
            .checked_add(amount)
            .ok_or_else(|| ChainError::reverted(REVERT_ADDITION_OVERFLOW))?;
        *self.balances.entry(to).or_default() += amount;
        self.supply = supply;
        Ok(())
    }

    fn burn(&mut self, from: Address, amount: Amount) -> Result<(), ChainError> {
        let balance = self.balance(&from);
        if balance < amount {
            return Err(ChainError::reverted(REVERT_BURN_EXCEEDS_BALANCE));
        }
        self.balances.insert(from, balance - amount);
        self.supply -= amount;
        Ok(())
    }

    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), ChainError> {
        let balance = self.balance(&from);
        if balance < amount {
            return Err(ChainError::reverted(REVERT_TRANSFER_EXCEEDS_BALANCE));
        }
        self.balances.insert(from, balance - amount);
        *self.balances.entry(to).or_default() += amount;
        Ok(())
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        self.allowances.insert((owner, spender), amount);
    }

    fn spend_allowance(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), ChainError> {
        let allowance = self
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            return Err(ChainError::reverted(REVERT_TRANSFER_EXCEEDS_ALLOWANCE));
        }
        if allowance != Amount::MAX {
            self.allowances.insert((owner, spender), allowance - amount);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VaultState {
    pub(crate) min_bps: Amount,
    pub(crate) paused: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct StrategyState {
    pub(crate) performance_fee_strategist: Amount,
    pub(crate) performance_fee_governance: Amount,
    pub(crate) withdrawal_fee: Amount,
    pub(crate) tendable: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ControllerState {
    vaults: HashMap<Address, Address>,
    strategies: HashMap<Address, Address>,
    approved: HashSet<(Address, Address)>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StakingState {
    pub(crate) apr_bps: Amount,
    stakes: HashMap<Address, Amount>,
    earned: HashMap<Address, Amount>,
    last_update: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct RouterState {
    pub(crate) rate_bps: Amount,
}

#[derive(Debug, Clone)]
pub(crate) struct LedgerState {
    pub(crate) contracts: Contracts,
    pub(crate) accounts: Accounts,
    pub(crate) block_number: u64,
    pub(crate) timestamp: u64,
    pub(crate) tx_count: u64,
    pub(crate) tokens: HashMap<Address, TokenState>,
    pub(crate) vault: VaultState,
    pub(crate) strategy: StrategyState,
    pub(crate) controller: ControllerState,
    pub(crate) staking: StakingState,
    pub(crate) router: RouterState,
}

fn authorize(allowed: bool, reason: &str) -> Result<(), ChainError> {
    if allowed {
        Ok(())
    } else {
        Err(ChainError::reverted(reason))
    }
}

fn expect_contract(address: Address, expected: Address) -> Result<(), ChainError> {
    if address == expected {
        Ok(())
    } else {
        Err(ChainError::UnknownContract(address))
    }
}

impl LedgerState {
    pub(crate) fn new(contracts: Contracts, accounts: Accounts) -> Self {
        let mut tokens = HashMap::new();
        for token in [
            contracts.want,
            contracts.reward,
            contracts.vault,
            contracts.stuck,
        ] {
            tokens.insert(token, TokenState::default());
        }
        Self {
            contracts,
            accounts,
            block_number: 1,
            timestamp: 1_600_000_000,
            tx_count: 0,
            tokens,
            vault: VaultState {
                min_bps: Amount::from(VAULT_MIN_BPS),
                paused: false,
            },
            strategy: StrategyState {
                performance_fee_strategist: Amount::zero(),
                performance_fee_governance: Amount::zero(),
                withdrawal_fee: Amount::zero(),
                tendable: false,
            },
            controller: ControllerState::default(),
            staking: StakingState::default(),
            router: RouterState {
                rate_bps: Amount::from(MAX_BPS),
            },
        }
    }

    fn token(&self, address: Address) -> Result<&TokenState, ChainError> {
        self.tokens
            .get(&address)
            .ok_or(ChainError::UnknownContract(address))
    }

    pub(crate) fn token_mut(&mut self, address: Address) -> Result<&mut TokenState, ChainError> {
        self.tokens
            .get_mut(&address)
            .ok_or(ChainError::UnknownContract(address))
    }

    fn want_balance(&self, owner: Address) -> Amount {
        self.tokens
            .get(&self.contracts.want)
            .map(|t| t.balance(&owner))
            .unwrap_or_default()
    }

    fn transfer_want(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), ChainError> {
        let want = self.contracts.want;
        self.token_mut(want)?.transfer(from, to, amount)
    }

    fn share_supply(&self) -> Amount {
        self.tokens
            .get(&self.contracts.vault)
            .map(|t| t.supply)
            .unwrap_or_default()
    }

    fn staked(&self, account: &Address) -> Amount {
        self.staking.stakes.get(account).copied().unwrap_or_default()
    }

    // Strategy views

    fn balance_of_want(&self) -> Amount {
        self.want_balance(self.contracts.strategy)
    }

    fn balance_of_pool(&self) -> Amount {
        self.staked(&self.contracts.strategy)
    }

    fn strategy_balance(&self) -> Amount {
        self.balance_of_want() + self.balance_of_pool()
    }

    // Vault views

    fn vault_balance(&self) -> Amount {
        self.want_balance(self.contracts.vault) + self.strategy_balance()
    }

    fn available(&self) -> Amount {
        bps_of(self.want_balance(self.contracts.vault), self.vault.min_bps)
    }

    fn price_per_full_share(&self) -> Amount {
        let supply = self.share_supply();
        let unit = Amount::exp10(SHARE_PRICE_DECIMALS as usize);
        if supply.is_zero() {
            return unit;
        }
        mul_div(self.vault_balance(), unit, supply).unwrap_or_default()
    }

    pub(crate) fn query(&self, query: &Query) -> Result<Value, ChainError> {
        let c = self.contracts;
        let a = self.accounts;
        match query {
            Query::BalanceOf { token, owner } => Ok(self.token(*token)?.balance(owner).into()),
            Query::TotalSupply { token } => Ok(self.token(*token)?.supply.into()),
            Query::Vault { vault, query } => {
                expect_contract(*vault, c.vault)?;
                Ok(match query {
                    VaultQuery::PricePerFullShare => self.price_per_full_share().into(),
                    VaultQuery::Balance => self.vault_balance().into(),
                    VaultQuery::Available => self.available().into(),
                    VaultQuery::Paused => self.vault.paused.into(),
                    VaultQuery::Token => c.want.into(),
                    VaultQuery::Controller => c.controller.into(),
                    VaultQuery::Keeper => a.keeper.into(),
                    VaultQuery::Governance => a.governance.into(),
                })
            }
            Query::Strategy { strategy, query } => {
                expect_contract(*strategy, c.strategy)?;
                let s = &self.strategy;
                Ok(match query {
                    StrategyQuery::BalanceOf => self.strategy_balance().into(),
                    StrategyQuery::BalanceOfWant => self.balance_of_want().into(),
                    StrategyQuery::BalanceOfPool => self.balance_of_pool().into(),
                    StrategyQuery::PerformanceFeeStrategist => s.performance_fee_strategist.into(),
                    StrategyQuery::PerformanceFeeGovernance => s.performance_fee_governance.into(),
                    StrategyQuery::WithdrawalFee => s.withdrawal_fee.into(),
                    StrategyQuery::IsTendable => s.tendable.into(),
                    StrategyQuery::ProtectedTokens => Value::Addresses(self.protected_tokens()),
                    StrategyQuery::Want => c.want.into(),
                    StrategyQuery::Strategist => a.strategist.into(),
                    StrategyQuery::Keeper => a.keeper.into(),
                    StrategyQuery::Governance => a.governance.into(),
                    StrategyQuery::Controller => c.controller.into(),
                })
            }
            Query::Controller { controller, query } => {
                expect_contract(*controller, c.controller)?;
                let ctl = &self.controller;
                Ok(match query {
                    ControllerQuery::ApprovedStrategies { want, strategy } => {
                        ctl.approved.contains(&(*want, *strategy)).into()
                    }
                    ControllerQuery::Strategies { want } => {
                        ctl.strategies.get(want).copied().unwrap_or_default().into()
                    }
                    ControllerQuery::Vaults { want } => {
                        ctl.vaults.get(want).copied().unwrap_or_default().into()
                    }
                    ControllerQuery::Rewards => a.rewards.into(),
                })
            }
        }
    }

    fn protected_tokens(&self) -> Vec<Address> {
        vec![self.contracts.want, self.contracts.reward]
    }

    /// Move the clock forward, leaving it untouched on overflow
    fn advance_clock(&mut self, blocks: u64, seconds: u64) -> Result<(), ChainError> {
        let overflow = || ChainError::ClockOverflow {
            block: self.block_number,
            blocks,
            seconds,
        };
        let block_number = self.block_number.checked_add(blocks).ok_or_else(overflow)?;
        let timestamp = self.timestamp.checked_add(seconds).ok_or_else(overflow)?;
        self.block_number = block_number;
        self.timestamp = timestamp;
        Ok(())
    }

    /// Credit staking rewards for the time elapsed since the last update
    fn accrue(&mut self) {
        let elapsed = self.timestamp.saturating_sub(self.staking.last_update);
        if elapsed > 0 {
            let denominator = Amount::from(MAX_BPS) * Amount::from(YEAR_SECONDS);
            let rate = self.staking.apr_bps * Amount::from(elapsed);
            for (account, stake) in &self.staking.stakes {
                let reward = mul_div(*stake, rate, denominator).unwrap_or_default();
                *self.staking.earned.entry(*account).or_default() += reward;
            }
        }
        self.staking.last_update = self.timestamp;
    }

    pub(crate) fn execute(
        &mut self,
        call: &Call,
        from: Address,
        events: &mut Vec<EventLog>,
    ) -> Result<(), ChainError> {
        self.accrue();
        match call {
            Call::Token { token, call } => match call {
                TokenCall::Transfer { to, amount } => self.token_mut(*token)?.transfer(from, *to, *amount),
                TokenCall::Approve { spender, amount } => {
                    self.token_mut(*token)?.approve(from, *spender, *amount);
                    Ok(())
                }
            },
            Call::Vault { vault, call } => {
                expect_contract(*vault, self.contracts.vault)?;
                self.vault_call(call, from)
            }
            Call::Strategy { strategy, call } => {
                expect_contract(*strategy, self.contracts.strategy)?;
                self.strategy_call(call, from, events)
            }
            Call::Controller { controller, call } => {
                expect_contract(*controller, self.contracts.controller)?;
                self.controller_call(call, from, events)
            }
        }
    }

    fn vault_call(&mut self, call: &VaultCall, from: Address) -> Result<(), ChainError> {
        let governance = self.accounts.governance;
        match call {
            VaultCall::Deposit { amount } => self.deposit(from, *amount),
            VaultCall::Withdraw { shares } => self.withdraw(from, *shares),
            VaultCall::WithdrawAll => {
                let shares = self.token(self.contracts.vault)?.balance(&from);
                self.withdraw(from, shares)
            }
            VaultCall::Earn => {
                authorize(
                    from == self.accounts.keeper || from == governance,
                    REVERT_ONLY_AUTHORIZED_ACTORS,
                )?;
                self.earn()
            }
            VaultCall::Pause => {
                authorize(from == governance || from == self.accounts.guardian, REVERT_ONLY_GOVERNANCE)?;
                self.vault.paused = true;
                Ok(())
            }
            VaultCall::Unpause => {
                authorize(from == governance, REVERT_ONLY_GOVERNANCE)?;
                self.vault.paused = false;
                Ok(())
            }
        }
    }

    fn deposit(&mut self, from: Address, amount: Amount) -> Result<(), ChainError> {
        if self.vault.paused {
            return Err(ChainError::reverted(REVERT_PAUSED));
        }
        let vault = self.contracts.vault;
        let pool = self.vault_balance();
        let supply = self.share_supply();

        let want = self.contracts.want;
        let token = self.token_mut(want)?;
        token.spend_allowance(from, vault, amount)?;
        token.transfer(from, vault, amount)?;

        let shares = if supply.is_zero() {
            amount
        } else {
            mul_div(amount, supply, pool).ok_or_else(|| ChainError::reverted(REVERT_DIVISION_BY_ZERO))?
        };
        self.token_mut(vault)?.mint(from, shares)
    }

    fn withdraw(&mut self, from: Address, shares: Amount) -> Result<(), ChainError> {
        if self.vault.paused {
            return Err(ChainError::reverted(REVERT_PAUSED));
        }
        let vault = self.contracts.vault;
        let supply = self.share_supply();
        let mut r = mul_div(self.vault_balance(), shares, supply)
            .ok_or_else(|| ChainError::reverted(REVERT_DIVISION_BY_ZERO))?;
        self.token_mut(vault)?.burn(from, shares)?;

        let idle = self.want_balance(vault);
        if idle < r {
            let needed = r - idle;
            self.controller_withdraw(needed)?;
            let diff = self.want_balance(vault) - idle;
            if diff < needed {
                r = idle + diff;
            }
        }
        self.transfer_want(vault, from, r)
    }

    fn earn(&mut self) -> Result<(), ChainError> {
        let c = self.contracts;
        let amount = self.available();
        self.transfer_want(c.vault, c.controller, amount)?;

        let strategy = self.strategy_for_want()?;
        self.transfer_want(c.controller, strategy, amount)?;
        self.strategy_deposit()
    }

    fn strategy_for_want(&self) -> Result<Address, ChainError> {
        self.controller
            .strategies
            .get(&self.contracts.want)
            .copied()
            .ok_or_else(|| ChainError::reverted(REVERT_NO_STRATEGY))
    }

    fn controller_withdraw(&mut self, amount: Amount) -> Result<(), ChainError> {
        let strategy = self.strategy_for_want()?;
        expect_contract(strategy, self.contracts.strategy)?;
        self.strategy_withdraw(amount)
    }

    // Strategy internals

    fn stake(&mut self, amount: Amount) -> Result<(), ChainError> {
        if amount.is_zero() {
            return Ok(());
        }
        let c = self.contracts;
        self.transfer_want(c.strategy, c.staking, amount)?;
        *self.staking.stakes.entry(c.strategy).or_default() += amount;
        Ok(())
    }

    fn unstake(&mut self, amount: Amount) -> Result<Amount, ChainError> {
        let c = self.contracts;
        let staked = self.balance_of_pool();
        let taken = amount.min(staked);
        if taken.is_zero() {
            return Ok(taken);
        }
        self.staking.stakes.insert(c.strategy, staked - taken);
        self.transfer_want(c.staking, c.strategy, taken)?;
        Ok(taken)
    }

    fn strategy_deposit(&mut self) -> Result<(), ChainError> {
        let idle = self.balance_of_want();
        self.stake(idle)
    }

    fn strategy_withdraw(&mut self, amount: Amount) -> Result<(), ChainError> {
        let c = self.contracts;
        let idle = self.balance_of_want();
        let mut amount = amount;
        if idle < amount {
            let freed = self.unstake(amount - idle)?;
            amount = amount.min(idle + freed);
        }

        let fee = bps_of(amount, self.strategy.withdrawal_fee);
        self.transfer_want(c.strategy, self.accounts.rewards, fee)?;
        self.transfer_want(c.strategy, c.vault, amount - fee)
    }

    fn strategy_withdraw_all(&mut self, events: &mut Vec<EventLog>) -> Result<(), ChainError> {
        let c = self.contracts;
        self.harvest(events)?;
        let pool = self.balance_of_pool();
        self.unstake(pool)?;
        let vault = self
            .controller
            .vaults
            .get(&c.want)
            .copied()
            .unwrap_or(c.vault);
        let idle = self.balance_of_want();
        self.transfer_want(c.strategy, vault, idle)
    }

    /// Claim staking rewards, swap them to want, take performance fees
    fn harvest(&mut self, events: &mut Vec<EventLog>) -> Result<Amount, ChainError> {
        let c = self.contracts;

        let reward = self.staking.earned.remove(&c.strategy).unwrap_or_default();
        self.token_mut(c.reward)?.mint(c.strategy, reward)?;
        events.push(EventLog::new(c.staking, HARVEST_EVENT).with_field("reward", reward));

        let to_swap = self.token(c.reward)?.balance(&c.strategy);
        let mut harvested = Amount::zero();
        if !to_swap.is_zero() {
            harvested = bps_of(to_swap, self.router.rate_bps);
            self.token_mut(c.reward)?.transfer(c.strategy, c.router, to_swap)?;
            self.transfer_want(c.router, c.strategy, harvested)?;
        }

        let governance_fee = bps_of(harvested, self.strategy.performance_fee_governance);
        let strategist_fee = bps_of(harvested, self.strategy.performance_fee_strategist);
        self.transfer_want(c.strategy, self.accounts.rewards, governance_fee)?;
        self.transfer_want(c.strategy, self.accounts.strategist, strategist_fee)?;
        Ok(harvested)
    }

    fn strategy_call(
        &mut self,
        call: &StrategyCall,
        from: Address,
        events: &mut Vec<EventLog>,
    ) -> Result<(), ChainError> {
        let a = self.accounts;
        let authorized = from == a.keeper || from == a.governance;
        match call {
            StrategyCall::Harvest => {
                authorize(authorized, REVERT_ONLY_AUTHORIZED_ACTORS)?;
                let harvested = self.harvest(events)?;
                if !self.strategy.tendable {
                    self.strategy_deposit()?;
                }
                events.push(
                    EventLog::new(self.contracts.strategy, HARVEST_EVENT)
                        .with_field("harvested", harvested)
                        .with_field("blockNumber", self.block_number + 1),
                );
                Ok(())
            }
            StrategyCall::Tend => {
                authorize(authorized, REVERT_ONLY_AUTHORIZED_ACTORS)?;
                if !self.strategy.tendable {
                    return Err(ChainError::reverted(REVERT_NOT_TENDABLE));
                }
                let pending = self.balance_of_want();
                self.stake(pending)?;
                events.push(EventLog::new(self.contracts.strategy, TEND_EVENT).with_field("tended", pending));
                Ok(())
            }
            StrategyCall::SetPerformanceFeeStrategist { bps } => {
                authorize(from == a.governance, REVERT_ONLY_GOVERNANCE)?;
                self.strategy.performance_fee_strategist = checked_fee(*bps)?;
                Ok(())
            }
            StrategyCall::SetPerformanceFeeGovernance { bps } => {
                authorize(from == a.governance, REVERT_ONLY_GOVERNANCE)?;
                self.strategy.performance_fee_governance = checked_fee(*bps)?;
                Ok(())
            }
            StrategyCall::SetWithdrawalFee { bps } => {
                authorize(from == a.governance, REVERT_ONLY_GOVERNANCE)?;
                self.strategy.withdrawal_fee = checked_fee(*bps)?;
                Ok(())
            }
        }
    }

    fn controller_call(
        &mut self,
        call: &ControllerCall,
        from: Address,
        events: &mut Vec<EventLog>,
    ) -> Result<(), ChainError> {
        authorize(from == self.accounts.governance, REVERT_ONLY_GOVERNANCE)?;
        let c = self.contracts;
        match call {
            ControllerCall::WithdrawAll { want } => {
                let strategy = self
                    .controller
                    .strategies
                    .get(want)
                    .copied()
                    .ok_or_else(|| ChainError::reverted(REVERT_NO_STRATEGY))?;
                expect_contract(strategy, c.strategy)?;
                self.strategy_withdraw_all(events)
            }
            ControllerCall::InCaseStrategyTokenGetStuck { strategy, token } => {
                expect_contract(*strategy, c.strategy)?;
                if self.protected_tokens().contains(token) {
                    return Err(ChainError::reverted(REVERT_PROTECTED_TOKEN));
                }
                let stuck = self.token_mut(*token)?;
                let balance = stuck.balance(&c.strategy);
                stuck.transfer(c.strategy, c.controller, balance)
            }
            ControllerCall::ApproveStrategy { want, strategy } => {
                self.controller.approved.insert((*want, *strategy));
                Ok(())
            }
            ControllerCall::SetStrategy { want, strategy } => {
                if !self.controller.approved.contains(&(*want, *strategy)) {
                    return Err(ChainError::reverted(REVERT_STRATEGY_NOT_APPROVED));
                }
                let current = self.controller.strategies.get(want).copied();
                if current == Some(c.strategy) && *strategy != c.strategy {
                    self.strategy_withdraw_all(events)?;
                }
                self.controller.strategies.insert(*want, *strategy);
                Ok(())
            }
            ControllerCall::SetVault { want, vault } => {
                self.controller.vaults.insert(*want, *vault);
                Ok(())
            }
        }
    }
}

fn checked_fee(bps: Amount) -> Result<Amount, ChainError> {
    if bps > Amount::from(MAX_FEE_BPS) {
        return Err(ChainError::reverted(REVERT_FEE_TOO_HIGH));
    }
    Ok(bps)
}

/// Simulated ledger implementing [`ChainClient`]
pub struct TestLedger {
    state: RwLock<LedgerState>,
    checkpoints: Mutex<Vec<LedgerState>>,
}

impl TestLedger {
    pub(crate) fn from_state(state: LedgerState) -> Self {
        Self {
            state: RwLock::new(state),
            checkpoints: Mutex::new(Vec::new()),
        }
    }

    pub fn contracts(&self) -> Contracts {
        self.state.read().contracts
    }

    pub fn accounts(&self) -> Accounts {
        self.state.read().accounts
    }

    pub fn timestamp(&self) -> u64 {
        self.state.read().timestamp
    }

    /// Mint `amount` of `token` out of thin air, outside of any transaction
    pub fn mint(&self, token: Address, to: Address, amount: Amount) -> Result<(), ChainError> {
        self.state.write().token_mut(token)?.mint(to, amount)
    }
}

#[async_trait]
impl ChainClient for TestLedger {
    async fn call(&self, query: &Query) -> Result<Value, ChainError> {
        self.state.read().query(query)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.state.read().block_number)
    }

    async fn call_batch(&self, queries: &[Query]) -> Result<Vec<Value>, ChainError> {
        let state = self.state.read();
        queries.iter().map(|query| state.query(query)).collect()
    }

    async fn send(&self, call: Call, from: Address) -> Result<Receipt, ChainError> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let mut events = Vec::new();
        next.execute(&call, from, &mut events)?;

        next.advance_clock(1, BLOCK_TIME)?;
        let receipt = Receipt {
            tx_index: next.tx_count,
            block_number: next.block_number,
            from,
            events,
        };
        next.tx_count += 1;
        *state = next;
        Ok(receipt)
    }

    async fn advance_time(&self, seconds: u64) -> Result<(), ChainError> {
        self.state.write().advance_clock(1, seconds)
    }

    async fn mine(&self, blocks: u64) -> Result<(), ChainError> {
        let seconds = blocks.saturating_mul(BLOCK_TIME);
        self.state.write().advance_clock(blocks, seconds)
    }

    async fn checkpoint(&self) -> Result<Checkpoint, ChainError> {
        let snapshot = self.state.read().clone();
        let mut checkpoints = self.checkpoints.lock();
        checkpoints.push(snapshot);
        Ok(Checkpoint(checkpoints.len() as u64 - 1))
    }

    async fn restore(&self, checkpoint: Checkpoint) -> Result<(), ChainError> {
        let saved = self
            .checkpoints
            .lock()
            .get(checkpoint.0 as usize)
            .cloned()
            .ok_or(ChainError::UnknownCheckpoint(checkpoint.0))?;
        *self.state.write() = saved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier1_component::{ether, TestLedgerBuilder};
    use sett_common::contracts::{Erc20, Strategy, Vault};

    async fn ledger() -> TestLedger {
        TestLedgerBuilder::new().build().await.unwrap()
    }

    async fn want_of(ledger: &TestLedger, owner: Address) -> Amount {
        let want = Erc20(ledger.contracts().want);
        ledger.call(&want.balance_of(owner)).await.unwrap().as_amount().unwrap()
    }

    #[tokio::test]
    async fn test_revert_leaves_state_untouched() {
        let ledger = ledger().await;
        let a = ledger.accounts();
        let vault = Vault(ledger.contracts().vault);
        let height = ledger.block_number().await.unwrap();

        let err = ledger.send(vault.earn(), a.random_user).await.unwrap_err();
        assert_eq!(err.revert_reason(), Some(REVERT_ONLY_AUTHORIZED_ACTORS));

        // Deposit beyond balance
        let err = ledger
            .send(vault.deposit(ether(5_000)), a.deployer)
            .await
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some(REVERT_TRANSFER_EXCEEDS_BALANCE));
        assert_eq!(ledger.block_number().await.unwrap(), height);
        assert_eq!(want_of(&ledger, a.deployer).await, ether(1_000));
    }

    #[tokio::test]
    async fn test_deposit_requires_allowance() {
        let ledger = TestLedgerBuilder::new().build().await.unwrap();
        let a = ledger.accounts();
        ledger.mint(ledger.contracts().want, a.random_user, ether(1)).unwrap();
        let err = ledger
            .send(Vault(ledger.contracts().vault).deposit(ether(1)), a.random_user)
            .await
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some(REVERT_TRANSFER_EXCEEDS_ALLOWANCE));
    }

    #[tokio::test]
    async fn test_checkpoint_restore_is_repeatable() {
        let ledger = ledger().await;
        let a = ledger.accounts();
        let vault = Vault(ledger.contracts().vault);

        let checkpoint = ledger.checkpoint().await.unwrap();
        for _ in 0..2 {
            ledger.send(vault.deposit(ether(10)), a.deployer).await.unwrap();
            assert_eq!(want_of(&ledger, a.deployer).await, ether(990));
            ledger.restore(checkpoint).await.unwrap();
            assert_eq!(want_of(&ledger, a.deployer).await, ether(1_000));
        }
        assert_eq!(
            ledger.restore(Checkpoint(9)).await.unwrap_err(),
            ChainError::UnknownCheckpoint(9)
        );
    }

    #[tokio::test]
    async fn test_clock_overflow_is_an_error() {
        let ledger = ledger().await;
        let height = ledger.block_number().await.unwrap();
        let now = ledger.timestamp();

        let err = ledger.advance_time(u64::MAX).await.unwrap_err();
        assert_eq!(
            err,
            ChainError::ClockOverflow {
                block: height,
                blocks: 1,
                seconds: u64::MAX
            }
        );
        assert!(matches!(
            ledger.mine(u64::MAX).await,
            Err(ChainError::ClockOverflow { .. })
        ));
        assert_eq!(ledger.block_number().await.unwrap(), height);
        assert_eq!(ledger.timestamp(), now);

        ledger.advance_time(60).await.unwrap();
        assert_eq!(ledger.timestamp(), now + 60);
    }

    #[tokio::test]
    async fn test_mint_past_supply_limit_reverts() {
        let ledger = ledger().await;
        let a = ledger.accounts();
        let want = Erc20(ledger.contracts().want);
        let supply = ledger.call(&want.total_supply()).await.unwrap().as_amount().unwrap();

        let err = ledger.mint(want.address(), a.random_user, Amount::MAX).unwrap_err();
        assert_eq!(err.revert_reason(), Some(REVERT_ADDITION_OVERFLOW));
        assert_eq!(ledger.call(&want.total_supply()).await.unwrap().as_amount().unwrap(), supply);
        assert!(want_of(&ledger, a.random_user).await.is_zero());
    }

    #[tokio::test]
    async fn test_harvest_emits_pool_then_strategy_event() {
        let ledger = ledger().await;
        let a = ledger.accounts();
        let c = ledger.contracts();
        let vault = Vault(c.vault);

        ledger.send(vault.deposit(ether(100)), a.deployer).await.unwrap();
        ledger.send(vault.earn(), a.keeper).await.unwrap();
        ledger.advance_time(YEAR_SECONDS).await.unwrap();
        let receipt = ledger.send(Strategy(c.strategy).harvest(), a.keeper).await.unwrap();

        let harvests: Vec<_> = receipt.events_named(HARVEST_EVENT).collect();
        assert_eq!(harvests.len(), 2);
        assert_eq!(harvests[0].emitter, c.staking);
        assert_eq!(harvests[1].emitter, c.strategy);
        assert!(harvests[1].contains("harvested"));

        // 95 staked at 20% for a little over a year
        let harvested = harvests[1].get("harvested").unwrap().as_amount().unwrap();
        assert!(harvested > ether(19) && harvested < ether(20));
        assert_eq!(want_of(&ledger, a.strategist).await, bps_of(harvested, Amount::from(1_000)));
    }

    #[tokio::test]
    async fn test_batch_reads_share_one_state() {
        let ledger = ledger().await;
        let c = ledger.contracts();
        let want = Erc20(c.want);
        let values = ledger
            .call_batch(&[want.total_supply(), want.balance_of(c.router)])
            .await
            .unwrap();
        assert_eq!(values[0].as_amount().unwrap(), ether(1_001_000));
        assert_eq!(values[1].as_amount().unwrap(), ether(1_000_000));

        let err = ledger
            .call(&Erc20(Address::from_low_u64_be(999)).total_supply())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::UnknownContract(_)));
    }
}
