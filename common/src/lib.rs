//! Shared types for the Sett vault/strategy harness.
//!
//! Everything the harness needs to talk about the external ledger lives here:
//! amounts, account identifiers, the read/write call vocabulary understood by
//! a [`chain::ChainClient`], transaction receipts and their event logs.

#![allow(clippy::upper_case_acronyms)]

pub mod address;
pub mod amount;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod receipt;

pub use address::Address;
pub use amount::Amount;
pub use chain::{ChainClient, Checkpoint, Value};
pub use contracts::{Call, Query};
pub use error::ChainError;
pub use receipt::{EventLog, Receipt};
