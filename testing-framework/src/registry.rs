//! Entity and token registries.
//!
//! A registry binds logical names ("strategist", "want", ...) to concrete
//! handles. Registration is append-only: re-registering a name with the same
//! handle is a no-op, with a different handle it is a [`ConfigError`].
//! Iteration follows insertion order so diagnostic output is deterministic.

use indexmap::IndexMap;
use sett_common::{
    address::{self, Address},
    contracts::Erc20,
    Query,
};
use std::fmt::Debug;

use crate::error::ConfigError;

/// Append-only name → handle map
#[derive(Debug, Clone)]
pub struct Registry<H> {
    kind: &'static str,
    entries: IndexMap<String, H>,
}

impl<H: Clone + PartialEq + Debug> Registry<H> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    /// Bind `name` to `handle`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateRegistration`] if `name` is already bound to a
    /// different handle.
    pub fn register(&mut self, name: impl Into<String>, handle: H) -> Result<(), ConfigError> {
        let name = name.into();
        if let Some(existing) = self.entries.get(&name) {
            if *existing == handle {
                return Ok(());
            }
            return Err(ConfigError::DuplicateRegistration {
                registry: self.kind,
                name,
                existing: format!("{:?}", existing),
                attempted: format!("{:?}", handle),
            });
        }
        self.entries.insert(name, handle);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&H, ConfigError> {
        self.entries
            .get(name)
            .ok_or_else(|| ConfigError::MissingEntry {
                registry: self.kind,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All entries in insertion order
    pub fn all(&self) -> impl Iterator<Item = (&str, &H)> {
        self.entries.iter().map(|(name, handle)| (name.as_str(), handle))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// First name registered for `handle`
    pub fn name_of(&self, handle: &H) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, h)| *h == handle)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Token handle: the ERC20 to query plus its display precision
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenHandle {
    pub token: Erc20,
    pub decimals: u8,
}

impl TokenHandle {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self {
            token: Erc20(address),
            decimals,
        }
    }

    pub fn address(&self) -> Address {
        self.token.address()
    }

    pub fn balance_of(&self, owner: Address) -> Query {
        self.token.balance_of(owner)
    }
}

impl Debug for TokenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} decimals)", address::to_hex(&self.address()), self.decimals)
    }
}

pub type EntityRegistry = Registry<Address>;
pub type TokenRegistry = Registry<TokenHandle>;
/// Named zero-argument accessors against the protocol contracts
pub type ScalarAccessors = Registry<Query>;

pub fn entity_registry() -> EntityRegistry {
    Registry::new("entity")
}

pub fn token_registry() -> TokenRegistry {
    Registry::new("token")
}

pub fn scalar_accessors() -> ScalarAccessors {
    Registry::new("scalar")
}
