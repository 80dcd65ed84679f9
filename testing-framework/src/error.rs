//! Error taxonomy of the harness.
//!
//! - [`ConfigError`]: setup bugs (missing registry entry, conflicting
//!   registration, snapshot shape mismatch, hook wiring). Never defaulted.
//! - [`HarnessError::Read`]: a balance or scalar read failed while taking a
//!   snapshot. No partial snapshot is ever returned.
//! - [`InvariantViolation`]: a check failed after an operation
//!   ([`HarnessError::Invariant`]) or in a standalone check
//!   ([`HarnessError::Check`]).
//! - [`HarnessError::Operation`]: the state-changing call itself failed; the
//!   chain error is carried unchanged.

use sett_common::ChainError;
use std::fmt;
use thiserror::Error;

use crate::executor::{OperationKind, OperationRecord};
use crate::resolver::HookSlot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{registry} registry has no entry named '{name}'")]
    MissingEntry { registry: &'static str, name: String },

    #[error("{registry} '{name}' is already registered as {existing}, refusing to rebind it to {attempted}")]
    DuplicateRegistration {
        registry: &'static str,
        name: String,
        existing: String,
        attempted: String,
    },

    #[error("Snapshot shapes differ: {0}")]
    ShapeMismatch(String),

    #[error("Snapshot has no balance for ({entity}, {token})")]
    MissingBalance { entity: String, token: String },

    #[error("Snapshot has no scalar '{0}'")]
    MissingScalar(String),

    #[error("Scalar '{key}' holds a {found} value, expected {expected}")]
    ScalarType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Resolver hook '{0}' was assigned more than once")]
    DuplicateHook(HookSlot),

    #[error("Resolver hook '{0}' must be supplied by the integration (or explicitly marked unchecked)")]
    MissingHook(HookSlot),

    #[error("Operation parameter '{0}' is required")]
    MissingParameter(&'static str),

    #[error("Deployment wiring is inconsistent: {0}")]
    Wiring(String),

    #[error("Illegal operation record transition {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Before/after values of one key that took part in a failed check
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Observation {
    pub key: String,
    pub before: String,
    pub after: String,
}

impl Observation {
    pub fn new(key: impl fmt::Display, before: impl fmt::Display, after: impl fmt::Display) -> Self {
        Self {
            key: key.to_string(),
            before: before.to_string(),
            after: after.to_string(),
        }
    }
}

/// A domain invariant that did not hold after an operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invariant '{invariant}' violated: {message}")]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub message: String,
    pub observations: Vec<Observation>,
}

impl InvariantViolation {
    pub fn new(invariant: &'static str, message: impl Into<String>) -> Self {
        Self {
            invariant,
            message: message.into(),
            observations: Vec::new(),
        }
    }

    pub fn observe(mut self, observation: Observation) -> Self {
        self.observations.push(observation);
        self
    }
}

/// Outcome of a resolver check: either the check could not be evaluated
/// (setup bug) or it was evaluated and failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Violation(#[from] InvariantViolation),
}

pub type CheckResult = Result<(), CheckError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot read failed ({what}): {source}")]
    Read {
        what: String,
        #[source]
        source: ChainError,
    },

    #[error("{kind} failed: {violation}")]
    Invariant {
        kind: OperationKind,
        violation: InvariantViolation,
        record: Box<OperationRecord>,
    },

    #[error("Check failed: {0}")]
    Check(InvariantViolation),

    #[error("{kind} call failed: {source}")]
    Operation {
        kind: OperationKind,
        #[source]
        source: ChainError,
    },

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

impl HarnessError {
    /// Revert reason when the underlying state-changing call reverted
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            HarnessError::Operation { source, .. } => source.revert_reason(),
            HarnessError::Chain(source) => source.revert_reason(),
            _ => None,
        }
    }

    pub fn violation(&self) -> Option<&InvariantViolation> {
        match self {
            HarnessError::Invariant { violation, .. } => Some(violation),
            HarnessError::Check(violation) => Some(violation),
            _ => None,
        }
    }
}
