//! DSL scenario parser and executor
//!
//! YAML scenarios drive the in-process ledger through the harness entry
//! points. Every operation step is snapshotted, diffed and checked exactly
//! like a hand-written test.
//!
//! - Amounts are strings: `"800"` or `"100 ether"`
//! - `from` names a scenario account or a role (`deployer`, `keeper`,
//!   `governance`, `strategist`, `guardian`, `random_user`, `rewards`)
//! - `assert_balance` compares a tracked `(entity, token)` balance with
//!   `eq`, `gt`, `gte`, `lt` or `lte`
//!
//! ## Example Scenario
//!
//! ```yaml
//! name: "Harvest after a year"
//! ledger:
//!   performance_fee_strategist: 1000
//! accounts:
//!   - name: "alice"
//!     want: "100 ether"
//! steps:
//!   - action: deposit
//!     from: alice
//!     fraction_bps: 8000
//!   - action: earn
//!     from: keeper
//!   - action: advance_time
//!     seconds: 31536000
//!   - action: expect_revert
//!     reason: "onlyAuthorizedActors"
//!     step:
//!       action: harvest
//!       from: random_user
//!   - action: harvest
//!     from: keeper
//!   - action: assert_balance
//!     entity: strategist
//!     token: want
//!     gt: "0"
//! ```

pub mod executor;
pub mod parser;

pub use executor::{ExecutionReport, ScenarioExecutor};
pub use parser::{load_scenario, parse_scenario, Step, TestScenario};
