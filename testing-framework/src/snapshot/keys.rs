// Well-known entity, token and scalar names shared by the core checks, the
// report printer and integrations.

use sett_common::contracts::{StrategyQuery, VaultQuery};

use crate::deployment::Deployment;
use crate::error::ConfigError;
use crate::registry::{scalar_accessors, ScalarAccessors};

pub const ENTITY_SETT: &str = "sett";
pub const ENTITY_STRATEGY: &str = "strategy";
pub const ENTITY_CONTROLLER: &str = "controller";
pub const ENTITY_STRATEGIST: &str = "strategist";
pub const ENTITY_GOVERNANCE_REWARDS: &str = "governanceRewards";

pub const TOKEN_WANT: &str = "want";
pub const TOKEN_SETT: &str = "sett";

pub const SETT_PRICE_PER_FULL_SHARE: &str = "sett.pricePerFullShare";
pub const SETT_TOTAL_SUPPLY: &str = "sett.totalSupply";
pub const SETT_BALANCE: &str = "sett.balance";
pub const SETT_AVAILABLE: &str = "sett.available";
pub const SETT_PAUSED: &str = "sett.paused";

pub const STRATEGY_BALANCE_OF: &str = "strategy.balanceOf";
pub const STRATEGY_BALANCE_OF_WANT: &str = "strategy.balanceOfWant";
pub const STRATEGY_BALANCE_OF_POOL: &str = "strategy.balanceOfPool";
pub const STRATEGY_PERFORMANCE_FEE_STRATEGIST: &str = "strategy.performanceFeeStrategist";
pub const STRATEGY_PERFORMANCE_FEE_GOVERNANCE: &str = "strategy.performanceFeeGovernance";
pub const STRATEGY_WITHDRAWAL_FEE: &str = "strategy.withdrawalFee";
pub const STRATEGY_IS_TENDABLE: &str = "strategy.isTendable";

/// Scalar accessors every snapshot of a deployment carries
pub fn default_scalars(deployment: &Deployment) -> Result<ScalarAccessors, ConfigError> {
    let vault = deployment.vault;
    let strategy = deployment.strategy;

    let mut scalars = scalar_accessors();
    scalars.register(
        SETT_PRICE_PER_FULL_SHARE,
        vault.query(VaultQuery::PricePerFullShare),
    )?;
    scalars.register(SETT_TOTAL_SUPPLY, vault.shares().total_supply())?;
    scalars.register(SETT_BALANCE, vault.query(VaultQuery::Balance))?;
    scalars.register(SETT_AVAILABLE, vault.query(VaultQuery::Available))?;
    scalars.register(SETT_PAUSED, vault.query(VaultQuery::Paused))?;

    scalars.register(STRATEGY_BALANCE_OF, strategy.query(StrategyQuery::BalanceOf))?;
    scalars.register(
        STRATEGY_BALANCE_OF_WANT,
        strategy.query(StrategyQuery::BalanceOfWant),
    )?;
    scalars.register(
        STRATEGY_BALANCE_OF_POOL,
        strategy.query(StrategyQuery::BalanceOfPool),
    )?;
    scalars.register(
        STRATEGY_PERFORMANCE_FEE_STRATEGIST,
        strategy.query(StrategyQuery::PerformanceFeeStrategist),
    )?;
    scalars.register(
        STRATEGY_PERFORMANCE_FEE_GOVERNANCE,
        strategy.query(StrategyQuery::PerformanceFeeGovernance),
    )?;
    scalars.register(
        STRATEGY_WITHDRAWAL_FEE,
        strategy.query(StrategyQuery::WithdrawalFee),
    )?;
    scalars.register(STRATEGY_IS_TENDABLE, strategy.query(StrategyQuery::IsTendable))?;

    Ok(scalars)
}
