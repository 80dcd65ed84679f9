//! Snapshot engine.
//!
//! A [`SnapshotPlan`] enumerates every (entity, token) balance and every named
//! scalar to read. [`SnapshotEngine::take`] resolves the whole plan with a
//! single batched read so balances and scalars come from one ledger state,
//! and fails outright if any read fails. Snapshots taken from the same plan
//! always have the same shape and can be diffed key by key.

pub mod keys;

use indexmap::IndexMap;
use log::trace;
use sett_common::{
    amount::Amount, ChainClient, ChainError, Query, Value,
};
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, HarnessError};
use crate::registry::{EntityRegistry, ScalarAccessors, TokenRegistry};

/// Composite key of a tracked balance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceKey {
    pub entity: String,
    pub token: String,
}

impl BalanceKey {
    pub fn new(entity: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            token: token.into(),
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.token)
    }
}

/// Immutable point-in-time view of tracked balances and protocol scalars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    balances: IndexMap<BalanceKey, Amount>,
    scalars: IndexMap<String, Value>,
}

impl Snapshot {
    pub fn from_parts(balances: IndexMap<BalanceKey, Amount>, scalars: IndexMap<String, Value>) -> Self {
        Self { balances, scalars }
    }

    pub fn balance(&self, entity: &str, token: &str) -> Result<Amount, ConfigError> {
        self.balances
            .get(&BalanceKey::new(entity, token))
            .copied()
            .ok_or_else(|| ConfigError::MissingBalance {
                entity: entity.to_string(),
                token: token.to_string(),
            })
    }

    pub fn scalar(&self, key: &str) -> Result<&Value, ConfigError> {
        self.scalars
            .get(key)
            .ok_or_else(|| ConfigError::MissingScalar(key.to_string()))
    }

    /// Scalar that must hold an amount
    pub fn amount(&self, key: &str) -> Result<Amount, ConfigError> {
        match self.scalar(key)? {
            Value::Amount(value) => Ok(*value),
            other => Err(ConfigError::ScalarType {
                key: key.to_string(),
                expected: "amount",
                found: other.to_string(),
            }),
        }
    }

    /// Scalar that must hold a boolean
    pub fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.scalar(key)? {
            Value::Bool(value) => Ok(*value),
            other => Err(ConfigError::ScalarType {
                key: key.to_string(),
                expected: "bool",
                found: other.to_string(),
            }),
        }
    }

    pub fn balances(&self) -> impl Iterator<Item = (&BalanceKey, &Amount)> {
        self.balances.iter()
    }

    pub fn scalars(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.scalars.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.balances.len() + self.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify both snapshots track exactly the same keys
    pub fn check_same_shape(&self, other: &Snapshot) -> Result<(), ConfigError> {
        if let Some(key) = self.balances.keys().find(|k| !other.balances.contains_key(*k)) {
            return Err(ConfigError::ShapeMismatch(format!("balance {} missing on one side", key)));
        }
        if let Some(key) = other.balances.keys().find(|k| !self.balances.contains_key(*k)) {
            return Err(ConfigError::ShapeMismatch(format!("balance {} missing on one side", key)));
        }
        if let Some(key) = self.scalars.keys().find(|k| !other.scalars.contains_key(*k)) {
            return Err(ConfigError::ShapeMismatch(format!("scalar {} missing on one side", key)));
        }
        if let Some(key) = other.scalars.keys().find(|k| !self.scalars.contains_key(*k)) {
            return Err(ConfigError::ShapeMismatch(format!("scalar {} missing on one side", key)));
        }
        Ok(())
    }

    /// Per-key `after - self`
    pub fn diff(&self, after: &Snapshot) -> Result<SnapshotDiff, ConfigError> {
        self.check_same_shape(after)?;

        let balances = self
            .balances
            .iter()
            .map(|(key, before)| {
                let after = after.balances[key];
                (key.clone(), Delta::between(*before, after))
            })
            .collect();

        let scalars = self
            .scalars
            .iter()
            .map(|(key, before)| {
                let delta = ScalarDelta::between(before, &after.scalars[key]);
                (key.clone(), delta)
            })
            .collect();

        Ok(SnapshotDiff { balances, scalars })
    }
}

/// Signed change of an amount, always `after - before`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Unchanged,
    Increase(Amount),
    Decrease(Amount),
}

impl Delta {
    pub fn between(before: Amount, after: Amount) -> Self {
        if after > before {
            Delta::Increase(after - before)
        } else if after < before {
            Delta::Decrease(before - after)
        } else {
            Delta::Unchanged
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Delta::Unchanged)
    }

    /// `before + delta`, `None` on overflow or underflow
    pub fn apply(&self, before: Amount) -> Option<Amount> {
        match self {
            Delta::Unchanged => Some(before),
            Delta::Increase(v) => before.checked_add(*v),
            Delta::Decrease(v) => before.checked_sub(*v),
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Unchanged => write!(f, "0"),
            Delta::Increase(v) => write!(f, "+{}", v),
            Delta::Decrease(v) => write!(f, "-{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarDelta {
    Amount(Delta),
    Unchanged,
    Changed { before: Value, after: Value },
}

impl ScalarDelta {
    fn between(before: &Value, after: &Value) -> Self {
        match (before, after) {
            (Value::Amount(b), Value::Amount(a)) => ScalarDelta::Amount(Delta::between(*b, *a)),
            (b, a) if b == a => ScalarDelta::Unchanged,
            (b, a) => ScalarDelta::Changed {
                before: b.clone(),
                after: a.clone(),
            },
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            ScalarDelta::Amount(delta) => delta.is_zero(),
            ScalarDelta::Unchanged => true,
            ScalarDelta::Changed { .. } => false,
        }
    }
}

/// Key-by-key difference of two same-shape snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    balances: IndexMap<BalanceKey, Delta>,
    scalars: IndexMap<String, ScalarDelta>,
}

impl SnapshotDiff {
    pub fn balance(&self, entity: &str, token: &str) -> Option<Delta> {
        self.balances.get(&BalanceKey::new(entity, token)).copied()
    }

    pub fn scalar(&self, key: &str) -> Option<&ScalarDelta> {
        self.scalars.get(key)
    }

    pub fn balances(&self) -> impl Iterator<Item = (&BalanceKey, &Delta)> {
        self.balances.iter()
    }

    pub fn scalars(&self) -> impl Iterator<Item = (&str, &ScalarDelta)> {
        self.scalars.iter().map(|(key, delta)| (key.as_str(), delta))
    }

    /// True when nothing changed over the interval
    pub fn is_zero(&self) -> bool {
        self.balances.values().all(Delta::is_zero) && self.scalars.values().all(ScalarDelta::is_zero)
    }
}

/// Ordered list of reads making up one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPlan {
    balance_keys: Vec<BalanceKey>,
    scalar_keys: Vec<String>,
    queries: Vec<Query>,
}

impl SnapshotPlan {
    /// Track every registered token for every registered entity, every
    /// scalar accessor, plus `extra` pairs. Extra pairs must name registered
    /// entities and tokens; pairs already covered are ignored.
    pub fn build(
        entities: &EntityRegistry,
        tokens: &TokenRegistry,
        scalars: &ScalarAccessors,
        extra: &[(String, String)],
    ) -> Result<Self, ConfigError> {
        let mut balance_keys = Vec::with_capacity(entities.len() * tokens.len() + extra.len());
        let mut queries = Vec::with_capacity(balance_keys.capacity() + scalars.len());

        for (token_name, token) in tokens.all() {
            for (entity_name, entity) in entities.all() {
                balance_keys.push(BalanceKey::new(entity_name, token_name));
                queries.push(token.balance_of(*entity));
            }
        }

        for (entity_name, token_name) in extra {
            let entity = entities.get(entity_name)?;
            let token = tokens.get(token_name)?;
            let key = BalanceKey::new(entity_name.as_str(), token_name.as_str());
            if balance_keys.contains(&key) {
                continue;
            }
            balance_keys.push(key);
            queries.push(token.balance_of(*entity));
        }

        let mut scalar_keys = Vec::with_capacity(scalars.len());
        for (name, query) in scalars.all() {
            scalar_keys.push(name.to_string());
            queries.push(query.clone());
        }

        Ok(Self {
            balance_keys,
            scalar_keys,
            queries,
        })
    }

    pub fn balance_keys(&self) -> &[BalanceKey] {
        &self.balance_keys
    }

    pub fn scalar_keys(&self) -> &[String] {
        &self.scalar_keys
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Read `queries` in one batch, failing if the client answers with the wrong
/// number of values
pub(crate) async fn read_batch(
    client: &dyn ChainClient,
    queries: &[Query],
    what: &str,
) -> Result<Vec<Value>, HarnessError> {
    let values = client
        .call_batch(queries)
        .await
        .map_err(|source| HarnessError::Read {
            what: what.to_string(),
            source,
        })?;
    if values.len() != queries.len() {
        return Err(HarnessError::Read {
            what: what.to_string(),
            source: ChainError::Transport(format!(
                "batch returned {} values for {} queries",
                values.len(),
                queries.len()
            )),
        });
    }
    Ok(values)
}

/// Resolves snapshot plans against the chain client
#[derive(Clone)]
pub struct SnapshotEngine {
    client: Arc<dyn ChainClient>,
}

impl SnapshotEngine {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Take a snapshot of every entity × token pair and every scalar
    pub async fn take_snapshot(
        &self,
        entities: &EntityRegistry,
        tokens: &TokenRegistry,
        scalars: &ScalarAccessors,
    ) -> Result<Snapshot, HarnessError> {
        let plan = SnapshotPlan::build(entities, tokens, scalars, &[])?;
        self.take(&plan).await
    }

    /// Resolve a plan with a single batched read.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Read`] if the batch fails or a balance read does not
    ///   return an amount
    pub async fn take(&self, plan: &SnapshotPlan) -> Result<Snapshot, HarnessError> {
        let values = read_batch(self.client.as_ref(), &plan.queries, "snapshot").await?;
        let (balance_values, scalar_values) = values.split_at(plan.balance_keys.len());

        let mut balances = IndexMap::with_capacity(plan.balance_keys.len());
        for (key, value) in plan.balance_keys.iter().zip(balance_values) {
            let amount = value.as_amount().map_err(|source| HarnessError::Read {
                what: format!("balance {}", key),
                source,
            })?;
            balances.insert(key.clone(), amount);
        }

        let scalars = plan
            .scalar_keys
            .iter()
            .cloned()
            .zip(scalar_values.iter().cloned())
            .collect();

        trace!(
            "Snapshot taken: {} balances, {} scalars",
            plan.balance_keys.len(),
            plan.scalar_keys.len()
        );

        Ok(Snapshot { balances, scalars })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot_of(amounts: &[u64]) -> Snapshot {
        let balances = amounts
            .iter()
            .enumerate()
            .map(|(idx, v)| (BalanceKey::new(format!("entity{}", idx), "want"), Amount::from(*v)))
            .collect();
        let mut scalars = IndexMap::new();
        scalars.insert("sett.paused".to_string(), Value::Bool(false));
        Snapshot::from_parts(balances, scalars)
    }

    #[test]
    fn test_diff_of_identical_snapshot_is_zero() {
        let snap = snapshot_of(&[1, 2, 3]);
        assert!(snap.diff(&snap).unwrap().is_zero());
    }

    #[test]
    fn test_diff_rejects_shape_mismatch() {
        let short = snapshot_of(&[1, 2]);
        let long = snapshot_of(&[1, 2, 3]);
        assert!(matches!(short.diff(&long), Err(ConfigError::ShapeMismatch(_))));
        assert!(matches!(long.diff(&short), Err(ConfigError::ShapeMismatch(_))));
    }

    #[test]
    fn test_scalar_type_is_checked() {
        let snap = snapshot_of(&[1]);
        assert!(snap.flag("sett.paused").is_ok());
        assert!(matches!(
            snap.amount("sett.paused"),
            Err(ConfigError::ScalarType { .. })
        ));
        assert_eq!(
            snap.amount("sett.totalSupply"),
            Err(ConfigError::MissingScalar("sett.totalSupply".to_string()))
        );
    }

    #[test]
    fn test_delta_direction() {
        assert_eq!(
            Delta::between(Amount::from(10), Amount::from(4)),
            Delta::Decrease(Amount::from(6))
        );
        assert_eq!(Delta::Increase(Amount::from(3)).to_string(), "+3");
    }

    proptest! {
        #[test]
        fn prop_diff_is_after_minus_before(pairs in proptest::collection::vec((any::<u64>(), any::<u64>()), 1..16)) {
            let before: Vec<u64> = pairs.iter().map(|(b, _)| *b).collect();
            let after: Vec<u64> = pairs.iter().map(|(_, a)| *a).collect();
            let s1 = snapshot_of(&before);
            let s2 = snapshot_of(&after);

            let diff = s1.diff(&s2).unwrap();
            for (idx, (b, a)) in pairs.iter().enumerate() {
                let delta = diff.balance(&format!("entity{}", idx), "want").unwrap();
                prop_assert_eq!(delta.apply(Amount::from(*b)), Some(Amount::from(*a)));
            }
        }

        #[test]
        fn prop_self_diff_is_zero(values in proptest::collection::vec(any::<u64>(), 0..16)) {
            let snap = snapshot_of(&values);
            prop_assert!(snap.diff(&snap).unwrap().is_zero());
        }
    }
}
