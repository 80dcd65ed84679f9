use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{address::Address, chain::Value};

/// Event emitted while executing a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    /// Contract that emitted the event
    pub emitter: Address,
    pub name: String,
    /// Named event arguments, in declaration order
    pub fields: IndexMap<String, Value>,
}

impl EventLog {
    pub fn new(emitter: Address, name: impl Into<String>) -> Self {
        Self {
            emitter,
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

/// Result of a successfully mined state-changing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Sequential transaction index on the ledger
    pub tx_index: u64,
    pub block_number: u64,
    pub from: Address,
    /// Events in emission order, including those from nested calls
    pub events: Vec<EventLog>,
}

impl Receipt {
    /// All events with the given name, in emission order
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EventLog> + 'a {
        self.events.iter().filter(move |event| event.name == name)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|event| event.name == name)
    }
}
