//! # Sett Testing Framework
//!
//! State-diffing invariant harness for Sett vault/strategy deployments.
//!
//! ## Architecture Overview
//!
//! Every user-visible operation (deposit, withdraw, earn, harvest, tend,
//! migrate) runs through the same loop:
//!
//! 1. snapshot every tracked `(entity, token)` balance plus the named scalars
//!    in one batched read
//! 2. execute the operation through the [`ChainClient`](sett_common::ChainClient)
//! 3. snapshot again
//! 4. assert the accounting laws of the operation kind, then the
//!    integration-specific [`Resolver`](resolver::Resolver) hook
//!
//! A failing check prints the operation kind, the violated invariant and the
//! before/after table to the configured sink before the error propagates.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sett_testing_framework::prelude::*;
//!
//! #[tokio::test]
//! async fn test_deposit_then_harvest() {
//!     let ledger = Arc::new(TestLedgerBuilder::new().build().await.unwrap());
//!     let resolver = staking_resolver(ledger.deployment()).unwrap();
//!     let mut manager = SnapshotManager::new(
//!         ledger.clone(),
//!         resolver,
//!         HarnessConfig::default().with_env_overrides(),
//!         Arc::new(LogSink),
//!     )
//!     .unwrap();
//!
//!     let roles = ledger.accounts();
//!     manager.register_account("deployer", roles.deployer).unwrap();
//!     manager.sett_deposit(roles.deployer, ether(800)).await.unwrap();
//!     manager.sett_earn(roles.keeper).await.unwrap();
//!     ledger.advance_time(YEAR_SECONDS).await.unwrap();
//!     manager.sett_harvest(roles.keeper).await.unwrap();
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod deployment;
pub mod error;
pub mod executor;

// Direction and magnitude checks over snapshot pairs
pub mod invariants;

pub mod manager;
pub mod registry;
pub mod report;
pub mod resolver;

// DSL scenario parser and executor
pub mod scenarios;

pub mod snapshot;

// In-process simulated ledger
pub mod tier1_component;

/// Failure artifacts
pub mod utilities;

// Convenient re-exports for common usage
pub mod prelude;

pub use error::{CheckError, CheckResult, ConfigError, HarnessError, InvariantViolation};
pub use manager::SnapshotManager;
pub use tier1_component::{TestLedger, TestLedgerBuilder};

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
