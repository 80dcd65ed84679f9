//! Direction and magnitude checks over a pair of snapshots.
//!
//! Every checker reads the tracked amount from both snapshots, so a missing
//! key surfaces as a [`ConfigError`] and never as a silent zero. Failures
//! carry the before/after values as [`Observation`]s for the report.

use sett_common::amount::Amount;
use std::fmt;

use crate::error::{CheckError, CheckResult, ConfigError, InvariantViolation, Observation};
use crate::snapshot::{Delta, Snapshot};

/// Location of a tracked amount inside a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracked<'a> {
    Balance { entity: &'a str, token: &'a str },
    Scalar(&'a str),
}

pub fn balance<'a>(entity: &'a str, token: &'a str) -> Tracked<'a> {
    Tracked::Balance { entity, token }
}

pub fn scalar(key: &str) -> Tracked<'_> {
    Tracked::Scalar(key)
}

impl Tracked<'_> {
    pub fn read(&self, snapshot: &Snapshot) -> Result<Amount, ConfigError> {
        match self {
            Tracked::Balance { entity, token } => snapshot.balance(entity, token),
            Tracked::Scalar(key) => snapshot.amount(key),
        }
    }

    fn observe(&self, before: Amount, after: Amount) -> Observation {
        Observation::new(self, before, after)
    }
}

impl fmt::Display for Tracked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tracked::Balance { entity, token } => write!(f, "{}.{}", entity, token),
            Tracked::Scalar(key) => write!(f, "{}", key),
        }
    }
}

fn read_pair(
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
) -> Result<(Amount, Amount), ConfigError> {
    Ok((tracked.read(before)?, tracked.read(after)?))
}

fn violation(
    invariant: &'static str,
    tracked: Tracked<'_>,
    before: Amount,
    after: Amount,
    message: String,
) -> CheckError {
    InvariantViolation::new(invariant, message)
        .observe(tracked.observe(before, after))
        .into()
}

/// `after - before` must equal `expected` exactly
pub fn check_delta_eq(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
    expected: Delta,
) -> CheckResult {
    let (b, a) = read_pair(before, after, tracked)?;
    let actual = Delta::between(b, a);
    if actual != expected {
        return Err(violation(
            invariant,
            tracked,
            b,
            a,
            format!("{} changed by {}, expected {}", tracked, actual, expected),
        ));
    }
    Ok(())
}

pub fn check_increased_by(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
    amount: Amount,
) -> CheckResult {
    check_delta_eq(invariant, before, after, tracked, Delta::between(Amount::zero(), amount))
}

pub fn check_decreased_by(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
    amount: Amount,
) -> CheckResult {
    check_delta_eq(invariant, before, after, tracked, Delta::between(amount, Amount::zero()))
}

pub fn check_strictly_increased(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
) -> CheckResult {
    let (b, a) = read_pair(before, after, tracked)?;
    if a <= b {
        return Err(violation(
            invariant,
            tracked,
            b,
            a,
            format!("{} did not increase", tracked),
        ));
    }
    Ok(())
}

pub fn check_not_decreased(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
) -> CheckResult {
    let (b, a) = read_pair(before, after, tracked)?;
    if a < b {
        return Err(violation(
            invariant,
            tracked,
            b,
            a,
            format!("{} decreased by {}", tracked, b - a),
        ));
    }
    Ok(())
}

pub fn check_not_increased(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
) -> CheckResult {
    let (b, a) = read_pair(before, after, tracked)?;
    if a > b {
        return Err(violation(
            invariant,
            tracked,
            b,
            a,
            format!("{} increased by {}", tracked, a - b),
        ));
    }
    Ok(())
}

pub fn check_unchanged(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
) -> CheckResult {
    check_delta_eq(invariant, before, after, tracked, Delta::Unchanged)
}

/// Tracked amount must be exactly zero in `after`
pub fn check_zero(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
) -> CheckResult {
    let (b, a) = read_pair(before, after, tracked)?;
    if !a.is_zero() {
        return Err(violation(
            invariant,
            tracked,
            b,
            a,
            format!("{} is {} after the operation, expected 0", tracked, a),
        ));
    }
    Ok(())
}

/// Increase must not exceed `bound`
pub fn check_increase_at_most(
    invariant: &'static str,
    before: &Snapshot,
    after: &Snapshot,
    tracked: Tracked<'_>,
    bound: Amount,
) -> CheckResult {
    let (b, a) = read_pair(before, after, tracked)?;
    if a < b {
        return Err(violation(
            invariant,
            tracked,
            b,
            a,
            format!("{} decreased by {}", tracked, b - a),
        ));
    }
    if a - b > bound {
        return Err(violation(
            invariant,
            tracked,
            b,
            a,
            format!("{} increased by {}, more than {}", tracked, a - b, bound),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::BalanceKey;
    use indexmap::IndexMap;
    use sett_common::Value;

    fn snap(want: u64, pps: u64) -> Snapshot {
        let mut balances = IndexMap::new();
        balances.insert(BalanceKey::new("sett", "want"), Amount::from(want));
        let mut scalars = IndexMap::new();
        scalars.insert("sett.pricePerFullShare".to_string(), Value::from(pps));
        Snapshot::from_parts(balances, scalars)
    }

    #[test]
    fn test_exact_delta() {
        let before = snap(100, 1);
        let after = snap(180, 1);
        let want = balance("sett", "want");
        assert!(check_increased_by("deposit", &before, &after, want, Amount::from(80)).is_ok());

        let err = check_increased_by("deposit", &before, &after, want, Amount::from(79)).unwrap_err();
        match err {
            CheckError::Violation(v) => {
                assert_eq!(v.invariant, "deposit");
                assert_eq!(v.observations[0], Observation::new("sett.want", 100, 180));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_direction_checks() {
        let before = snap(100, 10);
        let after = snap(100, 11);
        let pps = scalar("sett.pricePerFullShare");
        assert!(check_strictly_increased("pps", &before, &after, pps).is_ok());
        assert!(check_not_increased("pps", &before, &after, pps).is_err());
        assert!(check_not_decreased("pps", &after, &before, pps).is_err());
        assert!(check_unchanged("want", &before, &after, balance("sett", "want")).is_ok());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let before = snap(1, 1);
        let err = check_zero("zero", &before, &before, balance("strategy", "want")).unwrap_err();
        assert!(matches!(err, CheckError::Config(ConfigError::MissingBalance { .. })));
    }

    #[test]
    fn test_increase_bound() {
        let before = snap(100, 1);
        let after = snap(150, 1);
        let want = balance("sett", "want");
        assert!(check_increase_at_most("bound", &before, &after, want, Amount::from(50)).is_ok());
        assert!(check_increase_at_most("bound", &before, &after, want, Amount::from(49)).is_err());
    }
}
