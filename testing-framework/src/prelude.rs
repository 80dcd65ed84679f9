//! Convenient re-exports for harness users
//!
//! ```rust,ignore
//! use sett_testing_framework::prelude::*;
//! ```

pub use crate::config::HarnessConfig;
pub use crate::deployment::Deployment;
pub use crate::error::{
    CheckError, CheckResult, ConfigError, HarnessError, InvariantViolation, Observation,
};
pub use crate::executor::{OperationExecutor, OperationKind, OperationParams, OperationRecord, RecordState};
pub use crate::invariants::{balance, scalar};
pub use crate::manager::SnapshotManager;
pub use crate::registry::{EntityRegistry, TokenHandle, TokenRegistry};
pub use crate::report::{BufferSink, DiagnosticSink, LogSink, ReportPrinter, StdoutSink};
pub use crate::resolver::{HookContext, HookSlot, Resolver, ResolverBuilder};
pub use crate::scenarios::{parse_scenario, ScenarioExecutor};
pub use crate::snapshot::{keys::*, Delta, ScalarDelta, Snapshot, SnapshotDiff, SnapshotEngine, SnapshotPlan};
pub use crate::tier1_component::{ether, staking_resolver, TestLedger, TestLedgerBuilder, YEAR_SECONDS};

pub use sett_common::{
    address::Address, amount::Amount, ChainClient, ChainError, Checkpoint, EventLog, Receipt,
};
pub use std::sync::Arc;
