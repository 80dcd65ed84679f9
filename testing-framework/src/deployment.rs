//! The (vault, strategy, controller) triple a resolver is bound to, plus the
//! role accounts resolved from it.

use indexmap::IndexMap;
use log::debug;
use sett_common::{
    address::{self, Address},
    contracts::{Controller, ControllerQuery, Erc20, Strategy, StrategyQuery, Vault, VaultQuery},
    ChainClient,
};

use crate::error::{ConfigError, HarnessError};
use crate::snapshot::read_batch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub want: Erc20,
    pub vault: Vault,
    pub strategy: Strategy,
    pub controller: Controller,
    pub strategist: Address,
    pub governance: Address,
    pub keeper: Address,
    /// Recipient of the governance performance fee and withdrawal fee
    pub governance_rewards: Address,
    /// Integration-specific addresses (reward token, staking pool, router, ...)
    pub extras: IndexMap<String, Address>,
}

impl Deployment {
    /// Resolve roles and wiring from the deployed contracts.
    ///
    /// Fails with [`ConfigError::Wiring`] when the vault and strategy do not
    /// agree on the want token, or the controller does not point the want
    /// at this vault and strategy.
    pub async fn discover(
        client: &dyn ChainClient,
        vault: Address,
        strategy: Address,
    ) -> Result<Self, HarnessError> {
        let vault = Vault(vault);
        let strategy = Strategy(strategy);

        let queries = [
            vault.query(VaultQuery::Token),
            vault.query(VaultQuery::Controller),
            strategy.query(StrategyQuery::Want),
            strategy.query(StrategyQuery::Strategist),
            strategy.query(StrategyQuery::Governance),
            strategy.query(StrategyQuery::Keeper),
        ];
        let values = read_batch(client, &queries, "deployment roles").await?;
        let read = |idx: usize| {
            values[idx]
                .as_address()
                .map_err(|source| HarnessError::Read {
                    what: format!("{:?}", queries[idx]),
                    source,
                })
        };

        let want = read(0)?;
        let controller = Controller(read(1)?);
        let strategy_want = read(2)?;
        if want != strategy_want {
            return Err(ConfigError::Wiring(format!(
                "vault want {} differs from strategy want {}",
                address::to_hex(&want),
                address::to_hex(&strategy_want)
            ))
            .into());
        }

        let wiring = [
            controller.rewards(),
            controller.query(ControllerQuery::Vaults { want }),
            controller.query(ControllerQuery::Strategies { want }),
        ];
        let wired = read_batch(client, &wiring, "controller wiring").await?;
        let wired_address = |idx: usize| {
            wired[idx]
                .as_address()
                .map_err(|source| HarnessError::Read {
                    what: format!("{:?}", wiring[idx]),
                    source,
                })
        };

        let governance_rewards = wired_address(0)?;
        if wired_address(1)? != vault.address() {
            return Err(ConfigError::Wiring("controller maps want to another vault".to_string()).into());
        }
        if wired_address(2)? != strategy.address() {
            return Err(
                ConfigError::Wiring("controller maps want to another strategy".to_string()).into(),
            );
        }

        let deployment = Self {
            want: Erc20(want),
            vault,
            strategy,
            controller,
            strategist: read(3)?,
            governance: read(4)?,
            keeper: read(5)?,
            governance_rewards,
            extras: IndexMap::new(),
        };

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Discovered deployment: want={} vault={} strategy={} controller={}",
                address::short(&want),
                address::short(&deployment.vault.address()),
                address::short(&deployment.strategy.address()),
                address::short(&deployment.controller.address())
            );
        }

        Ok(deployment)
    }

    pub fn with_extra(mut self, name: impl Into<String>, address: Address) -> Self {
        self.extras.insert(name.into(), address);
        self
    }

    pub fn extra(&self, name: &str) -> Result<Address, ConfigError> {
        self.extras
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::MissingEntry {
                registry: "deployment extra",
                name: name.to_string(),
            })
    }
}
