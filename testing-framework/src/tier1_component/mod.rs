//! Tier 1: in-process Sett ledger
//!
//! A deterministic [`ChainClient`](sett_common::ChainClient) running a
//! vault, controller and single-staking strategy entirely in memory. No node,
//! no RPC. Reverted calls leave the state untouched and every committed call
//! mines one block.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sett_testing_framework::prelude::*;
//!
//! #[tokio::test]
//! async fn test_deposit() {
//!     let ledger = Arc::new(TestLedgerBuilder::new().build().await.unwrap());
//!     let resolver = staking_resolver(ledger.deployment()).unwrap();
//!     let mut manager =
//!         SnapshotManager::new(ledger.clone(), resolver, HarnessConfig::default(), Arc::new(LogSink))
//!             .unwrap();
//!
//!     let deployer = ledger.accounts().deployer;
//!     manager.register_account("deployer", deployer).unwrap();
//!     manager.sett_deposit(deployer, ether(10)).await.unwrap();
//! }
//! ```

mod builder;
mod ledger;
mod resolver;

pub use builder::TestLedgerBuilder;
pub use ledger::{TestLedger, BLOCK_TIME, YEAR_SECONDS};
pub use resolver::{staking_resolver, EXTRA_REWARD, EXTRA_ROUTER, EXTRA_STAKING};

use sett_common::{
    address::{address_from_index, Address},
    amount::Amount,
    contracts::{Controller, Erc20, Strategy, Vault},
};

use crate::deployment::Deployment;

/// `n` whole tokens at 18 decimals
pub fn ether(n: u64) -> Amount {
    Amount::from(n) * Amount::exp10(18)
}

/// Externally owned accounts of the simulated deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accounts {
    pub deployer: Address,
    pub strategist: Address,
    pub keeper: Address,
    pub guardian: Address,
    pub governance: Address,
    pub random_user: Address,
    /// Receives governance performance fees and withdrawal fees
    pub rewards: Address,
}

impl Default for Accounts {
    fn default() -> Self {
        Self {
            deployer: address_from_index(1),
            strategist: address_from_index(2),
            keeper: address_from_index(3),
            guardian: address_from_index(4),
            governance: address_from_index(5),
            random_user: address_from_index(6),
            rewards: address_from_index(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contracts {
    pub want: Address,
    pub reward: Address,
    pub vault: Address,
    pub strategy: Address,
    pub controller: Address,
    pub staking: Address,
    pub router: Address,
    /// Unprotected token the strategy may end up holding
    pub stuck: Address,
}

impl Default for Contracts {
    fn default() -> Self {
        Self {
            want: address_from_index(100),
            reward: address_from_index(101),
            vault: address_from_index(102),
            strategy: address_from_index(103),
            controller: address_from_index(104),
            staking: address_from_index(105),
            router: address_from_index(106),
            stuck: address_from_index(107),
        }
    }
}

impl TestLedger {
    /// Deployment view of the simulated contracts, with the reward token,
    /// staking pool and router as extras
    pub fn deployment(&self) -> Deployment {
        let c = self.contracts();
        let a = self.accounts();
        Deployment {
            want: Erc20(c.want),
            vault: Vault(c.vault),
            strategy: Strategy(c.strategy),
            controller: Controller(c.controller),
            strategist: a.strategist,
            governance: a.governance,
            keeper: a.keeper,
            governance_rewards: a.rewards,
            extras: Default::default(),
        }
        .with_extra(EXTRA_REWARD, c.reward)
        .with_extra(EXTRA_STAKING, c.staking)
        .with_extra(EXTRA_ROUTER, c.router)
    }
}
