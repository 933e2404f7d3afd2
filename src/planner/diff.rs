//! Variable diffing between desired and remote state.
//!
//! Every variable write may trigger a redeployment on Railway, so only keys
//! whose value actually changed are sent.

use std::collections::BTreeMap;

/// Difference between desired and current variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableDiff {
    /// Keys to write with their desired values.
    pub changed: BTreeMap<String, String>,
    /// Remote values of changed keys that already existed.
    pub previous: BTreeMap<String, String>,
    /// Changed keys that did not exist remotely.
    pub added: Vec<String>,
}

impl VariableDiff {
    /// Computes the keys of `desired` that are absent from or differ in `current`.
    ///
    /// Keys present only in `current` are left alone.
    #[must_use]
    pub fn between(desired: &BTreeMap<String, String>, current: &BTreeMap<String, String>) -> Self {
        let mut diff = Self::default();

        for (key, value) in desired {
            match current.get(key) {
                Some(existing) if existing == value => {}
                Some(existing) => {
                    diff.previous.insert(key.clone(), existing.clone());
                    diff.changed.insert(key.clone(), value.clone());
                }
                None => {
                    diff.added.push(key.clone());
                    diff.changed.insert(key.clone(), value.clone());
                }
            }
        }

        diff
    }

    /// Returns true if nothing needs to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Number of keys to write.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changed.len()
    }

    /// Comma-separated list of changed keys.
    #[must_use]
    pub fn keys(&self) -> String {
        self.changed.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}
