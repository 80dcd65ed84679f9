//! Call vocabulary for the external vault, strategy, controller and token
//! contracts.
//!
//! [`Query`] covers every read-only accessor the harness uses; [`Call`] covers
//! every state-changing entry point. The typed handles ([`Erc20`], [`Vault`],
//! [`Strategy`], [`Controller`]) build both from a contract address so that
//! call sites read like the contract ABI.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{address::Address, amount::Amount};

/// Read-only accessor against the external ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Query {
    /// ERC20 `balanceOf(owner)`; vault shares are queried the same way
    BalanceOf { token: Address, owner: Address },
    /// ERC20 `totalSupply()`
    TotalSupply { token: Address },
    Vault { vault: Address, query: VaultQuery },
    Strategy { strategy: Address, query: StrategyQuery },
    Controller { controller: Address, query: ControllerQuery },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultQuery {
    PricePerFullShare,
    /// Idle want plus want deployed through the controller
    Balance,
    /// Idle want the vault would forward on earn()
    Available,
    Paused,
    Token,
    Controller,
    Keeper,
    Governance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyQuery {
    /// Total want managed: idle plus deployed
    BalanceOf,
    /// Idle want held by the strategy, not yet deployed
    BalanceOfWant,
    /// Want deployed in the productive position
    BalanceOfPool,
    PerformanceFeeStrategist,
    PerformanceFeeGovernance,
    WithdrawalFee,
    IsTendable,
    ProtectedTokens,
    Want,
    Strategist,
    Keeper,
    Governance,
    Controller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerQuery {
    ApprovedStrategies { want: Address, strategy: Address },
    Strategies { want: Address },
    Vaults { want: Address },
    Rewards,
}

/// State-changing entry point on the external ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    Token { token: Address, call: TokenCall },
    Vault { vault: Address, call: VaultCall },
    Strategy { strategy: Address, call: StrategyCall },
    Controller { controller: Address, call: ControllerCall },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenCall {
    Transfer { to: Address, amount: Amount },
    Approve { spender: Address, amount: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultCall {
    Deposit { amount: Amount },
    Withdraw { shares: Amount },
    WithdrawAll,
    Earn,
    Pause,
    Unpause,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyCall {
    Harvest,
    Tend,
    SetPerformanceFeeStrategist { bps: Amount },
    SetPerformanceFeeGovernance { bps: Amount },
    SetWithdrawalFee { bps: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerCall {
    WithdrawAll { want: Address },
    InCaseStrategyTokenGetStuck { strategy: Address, token: Address },
    ApproveStrategy { want: Address, strategy: Address },
    SetStrategy { want: Address, strategy: Address },
    SetVault { want: Address, vault: Address },
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Token { call, .. } => match call {
                TokenCall::Transfer { amount, .. } => write!(f, "token.transfer({})", amount),
                TokenCall::Approve { amount, .. } => write!(f, "token.approve({})", amount),
            },
            Call::Vault { call, .. } => match call {
                VaultCall::Deposit { amount } => write!(f, "sett.deposit({})", amount),
                VaultCall::Withdraw { shares } => write!(f, "sett.withdraw({})", shares),
                VaultCall::WithdrawAll => write!(f, "sett.withdrawAll()"),
                VaultCall::Earn => write!(f, "sett.earn()"),
                VaultCall::Pause => write!(f, "sett.pause()"),
                VaultCall::Unpause => write!(f, "sett.unpause()"),
            },
            Call::Strategy { call, .. } => match call {
                StrategyCall::Harvest => write!(f, "strategy.harvest()"),
                StrategyCall::Tend => write!(f, "strategy.tend()"),
                StrategyCall::SetPerformanceFeeStrategist { bps } => {
                    write!(f, "strategy.setPerformanceFeeStrategist({})", bps)
                }
                StrategyCall::SetPerformanceFeeGovernance { bps } => {
                    write!(f, "strategy.setPerformanceFeeGovernance({})", bps)
                }
                StrategyCall::SetWithdrawalFee { bps } => {
                    write!(f, "strategy.setWithdrawalFee({})", bps)
                }
            },
            Call::Controller { call, .. } => match call {
                ControllerCall::WithdrawAll { .. } => write!(f, "controller.withdrawAll(want)"),
                ControllerCall::InCaseStrategyTokenGetStuck { .. } => {
                    write!(f, "controller.inCaseStrategyTokenGetStuck(strategy, token)")
                }
                ControllerCall::ApproveStrategy { .. } => {
                    write!(f, "controller.approveStrategy(want, strategy)")
                }
                ControllerCall::SetStrategy { .. } => {
                    write!(f, "controller.setStrategy(want, strategy)")
                }
                ControllerCall::SetVault { .. } => write!(f, "controller.setVault(want, vault)"),
            },
        }
    }
}

/// ERC20 token handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Erc20(pub Address);

impl Erc20 {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn balance_of(&self, owner: Address) -> Query {
        Query::BalanceOf {
            token: self.0,
            owner,
        }
    }

    pub fn total_supply(&self) -> Query {
        Query::TotalSupply { token: self.0 }
    }

    pub fn transfer(&self, to: Address, amount: Amount) -> Call {
        Call::Token {
            token: self.0,
            call: TokenCall::Transfer { to, amount },
        }
    }

    pub fn approve(&self, spender: Address, amount: Amount) -> Call {
        Call::Token {
            token: self.0,
            call: TokenCall::Approve { spender, amount },
        }
    }
}

/// Sett vault handle. The vault is also the ERC20 of its shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vault(pub Address);

impl Vault {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn shares(&self) -> Erc20 {
        Erc20(self.0)
    }

    pub fn query(&self, query: VaultQuery) -> Query {
        Query::Vault {
            vault: self.0,
            query,
        }
    }

    fn call(&self, call: VaultCall) -> Call {
        Call::Vault {
            vault: self.0,
            call,
        }
    }

    pub fn deposit(&self, amount: Amount) -> Call {
        self.call(VaultCall::Deposit { amount })
    }

    pub fn withdraw(&self, shares: Amount) -> Call {
        self.call(VaultCall::Withdraw { shares })
    }

    pub fn withdraw_all(&self) -> Call {
        self.call(VaultCall::WithdrawAll)
    }

    pub fn earn(&self) -> Call {
        self.call(VaultCall::Earn)
    }

    pub fn pause(&self) -> Call {
        self.call(VaultCall::Pause)
    }

    pub fn unpause(&self) -> Call {
        self.call(VaultCall::Unpause)
    }
}

/// Strategy handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strategy(pub Address);

impl Strategy {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn query(&self, query: StrategyQuery) -> Query {
        Query::Strategy {
            strategy: self.0,
            query,
        }
    }

    fn call(&self, call: StrategyCall) -> Call {
        Call::Strategy {
            strategy: self.0,
            call,
        }
    }

    pub fn harvest(&self) -> Call {
        self.call(StrategyCall::Harvest)
    }

    pub fn tend(&self) -> Call {
        self.call(StrategyCall::Tend)
    }

    pub fn set_performance_fee_strategist(&self, bps: Amount) -> Call {
        self.call(StrategyCall::SetPerformanceFeeStrategist { bps })
    }

    pub fn set_performance_fee_governance(&self, bps: Amount) -> Call {
        self.call(StrategyCall::SetPerformanceFeeGovernance { bps })
    }

    pub fn set_withdrawal_fee(&self, bps: Amount) -> Call {
        self.call(StrategyCall::SetWithdrawalFee { bps })
    }
}

/// Controller handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Controller(pub Address);

impl Controller {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn query(&self, query: ControllerQuery) -> Query {
        Query::Controller {
            controller: self.0,
            query,
        }
    }

    fn call(&self, call: ControllerCall) -> Call {
        Call::Controller {
            controller: self.0,
            call,
        }
    }

    pub fn rewards(&self) -> Query {
        self.query(ControllerQuery::Rewards)
    }

    pub fn withdraw_all(&self, want: Address) -> Call {
        self.call(ControllerCall::WithdrawAll { want })
    }

    pub fn in_case_strategy_token_get_stuck(&self, strategy: Address, token: Address) -> Call {
        self.call(ControllerCall::InCaseStrategyTokenGetStuck { strategy, token })
    }

    pub fn approve_strategy(&self, want: Address, strategy: Address) -> Call {
        self.call(ControllerCall::ApproveStrategy { want, strategy })
    }

    pub fn set_strategy(&self, want: Address, strategy: Address) -> Call {
        self.call(ControllerCall::SetStrategy { want, strategy })
    }

    pub fn set_vault(&self, want: Address, vault: Address) -> Call {
        self.call(ControllerCall::SetVault { want, vault })
    }
}
