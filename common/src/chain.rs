//! Narrow interface to the external ledger.
//!
//! The harness never talks to a node, a signer or a block producer directly.
//! Everything goes through [`ChainClient`]: read-only queries, one
//! state-changing entry point, time control and checkpoint/restore for
//! isolating scenarios from each other.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    address::{self, Address},
    amount::Amount,
    contracts::{Call, Query},
    error::ChainError,
    receipt::Receipt,
};

/// Value returned by a read-only query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Amount(Amount),
    Bool(bool),
    Address(Address),
    Addresses(Vec<Address>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Amount(_) => "amount",
            Value::Bool(_) => "bool",
            Value::Address(_) => "address",
            Value::Addresses(_) => "address list",
        }
    }

    fn unexpected(&self, expected: &'static str) -> ChainError {
        ChainError::UnexpectedValue {
            expected,
            found: self.kind().to_string(),
        }
    }

    pub fn as_amount(&self) -> Result<Amount, ChainError> {
        match self {
            Value::Amount(v) => Ok(*v),
            other => Err(other.unexpected("amount")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ChainError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(other.unexpected("bool")),
        }
    }

    pub fn as_address(&self) -> Result<Address, ChainError> {
        match self {
            Value::Address(v) => Ok(*v),
            other => Err(other.unexpected("address")),
        }
    }

    pub fn as_addresses(&self) -> Result<&[Address], ChainError> {
        match self {
            Value::Addresses(v) => Ok(v),
            other => Err(other.unexpected("address list")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Amount(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Address(v) => write!(f, "{}", address::to_hex(v)),
            Value::Addresses(list) => {
                let rendered: Vec<String> = list.iter().map(address::to_hex).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<Amount> for Value {
    fn from(value: Amount) -> Self {
        Value::Amount(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Amount(Amount::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Value::Address(value)
    }
}

/// Opaque handle to a saved ledger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint(pub u64);

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Execute a read-only accessor against the current state
    async fn call(&self, query: &Query) -> Result<Value, ChainError>;

    /// Height of the latest mined block; advances on every state change
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Execute several reads against one and the same ledger state.
    ///
    /// Clients that can serve a true multicall should override this. The
    /// default issues the reads one after another and brackets them with
    /// block-number reads, failing if the ledger moved in between.
    async fn call_batch(&self, queries: &[Query]) -> Result<Vec<Value>, ChainError> {
        let start = self.block_number().await?;
        let mut values = Vec::with_capacity(queries.len());
        for query in queries {
            values.push(self.call(query).await?);
        }
        let end = self.block_number().await?;
        if start != end {
            return Err(ChainError::StateMoved { start, end });
        }
        Ok(values)
    }

    /// Submit a state-changing call signed by `from` and wait for its receipt
    async fn send(&self, call: Call, from: Address) -> Result<Receipt, ChainError>;

    /// Move the ledger clock forward and mine one block
    async fn advance_time(&self, seconds: u64) -> Result<(), ChainError>;

    async fn mine(&self, blocks: u64) -> Result<(), ChainError>;

    async fn checkpoint(&self) -> Result<Checkpoint, ChainError>;

    /// Return to a saved state. The checkpoint stays valid and can be
    /// restored again.
    async fn restore(&self, checkpoint: Checkpoint) -> Result<(), ChainError>;
}
