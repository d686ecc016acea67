//! Append-only key/value database backing the synchronized data
//!
//! Every write appends to the history of its key, reads return the latest
//! value. Histories live inside a period; starting a new period drops every
//! key that is not explicitly carried over.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{StateError, StateResult};
use crate::synchronized_data::{ALL_PARTICIPANTS_KEY, PARTICIPANTS_KEY};

/// Keys every new period inherits on top of the app's persisted keys
pub const DEFAULT_CROSS_PERIOD_KEYS: [&str; 2] = [PARTICIPANTS_KEY, ALL_PARTICIPANTS_KEY];

/// Replicated application database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbciAppDb {
    /// Number of completed periods
    period_count: u64,

    /// Value history per key for the current period, oldest first
    data: BTreeMap<String, Vec<Value>>,
}

impl AbciAppDb {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database seeded with setup values
    pub fn with_setup<I, K>(setup: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let data = setup
            .into_iter()
            .map(|(key, value)| (key.into(), vec![value]))
            .collect();

        Self {
            period_count: 0,
            data,
        }
    }

    /// Current period
    pub fn period_count(&self) -> u64 {
        self.period_count
    }

    /// Latest value of a key, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).and_then(|history| history.last())
    }

    /// Latest value of a key, failing if the key was never written
    pub fn get_strict(&self, key: &str) -> StateResult<&Value> {
        self.get(key)
            .ok_or_else(|| StateError::KeyNotFound(key.to_string()))
    }

    /// Latest value of a key decoded into `T`
    pub fn get_strict_as<T: DeserializeOwned>(&self, key: &str) -> StateResult<T> {
        let value = self.get_strict(key)?;
        serde_json::from_value(value.clone()).map_err(|source| StateError::InvalidValue {
            key: key.to_string(),
            source,
        })
    }

    /// Whether the key holds a value in this period
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All values written to a key in this period
    pub fn history(&self, key: &str) -> &[Value] {
        self.data.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a value to the history of a key
    pub fn update(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        debug!("Appending value for key {} in period {}", key, self.period_count);
        self.data.entry(key).or_default().push(value);
    }

    /// Write a key that may only be set once per period
    pub fn update_once(&mut self, key: impl Into<String>, value: Value) -> StateResult<()> {
        let key = key.into();
        if self.contains(&key) {
            return Err(StateError::AlreadySet {
                key,
                period: self.period_count,
            });
        }
        self.update(key, value);
        Ok(())
    }

    /// Start the next period, carrying over the participant keys and
    /// `persisted_keys`
    pub fn new_period(&self, persisted_keys: &BTreeSet<String>) -> Self {
        let data = self
            .data
            .iter()
            .filter(|(key, _)| {
                persisted_keys.contains(*key) || DEFAULT_CROSS_PERIOD_KEYS.contains(&key.as_str())
            })
            .filter_map(|(key, history)| {
                history.last().map(|value| (key.clone(), vec![value.clone()]))
            })
            .collect();

        Self {
            period_count: self.period_count + 1,
            data,
        }
    }
}
