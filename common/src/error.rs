use thiserror::Error;

use crate::address::Address;

/// Failure reported by the external ledger or the transport in front of it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Execution reverted: {reason}")]
    Reverted { reason: String },

    #[error("No contract deployed at {0:?}")]
    UnknownContract(Address),

    #[error("Contract at {address:?} does not support {operation}")]
    Unsupported {
        address: Address,
        operation: &'static str,
    },

    #[error("Expected {expected} value, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: String,
    },

    #[error("Ledger state moved from block {start} to block {end} during a batched read")]
    StateMoved { start: u64, end: u64 },

    #[error("Unknown checkpoint {0}")]
    UnknownCheckpoint(u64),

    #[error("Ledger clock cannot move {blocks} blocks and {seconds}s past block {block}")]
    ClockOverflow { block: u64, blocks: u64, seconds: u64 },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ChainError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted {
            reason: reason.into(),
        }
    }

    /// Revert reason if this error is a contract revert
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Reverted { reason } => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }
}
