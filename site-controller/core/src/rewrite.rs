//! The URL rewrite table.
//!
//! Every site's Configuration carries a copy of the namespace-wide table that
//! maps a site's rewrite key (`{name}.{namespace}`) to the site's resolved
//! address. The copies are replicated, not partitioned: any site's reconcile
//! pass may correct entries in any Configuration, with last-writer-wins per
//! key.

use crate::ResourceId;
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteTable(BTreeMap<String, String>);

#[derive(Debug, thiserror::Error)]
#[error("malformed rewrite table: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

// === impl RewriteTable ===

impl RewriteTable {
    /// Decodes the stored form. A missing or empty value decodes to an empty
    /// table.
    pub fn decode(raw: Option<&str>) -> Result<Self, DecodeError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => Ok(Self(serde_json::from_str(raw)?)),
        }
    }

    /// Encodes the table as a JSON object with sorted keys.
    pub fn encode(&self) -> String {
        // Serializing a map of strings cannot fail.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sets `key` to `value`, returning true if the table changed.
    pub fn upsert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.0.insert(key.into(), value.clone()) {
            Some(prior) => prior != value,
            None => true,
        }
    }

    /// Removes `key`, returning true if it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key).is_some()
    }

    /// Removes every entry that belongs to `namespace` but names a site not in
    /// `live`. Entries for other namespaces are left alone. Returns the removed
    /// keys.
    pub fn prune(&mut self, namespace: &str, live: &HashSet<ResourceId>) -> Vec<String> {
        let stale = self
            .0
            .keys()
            .filter(|key| match ResourceId::from_rewrite_key(key, namespace) {
                Some(id) => !live.contains(&id),
                None => false,
            })
            .cloned()
            .collect::<Vec<_>>();
        for key in &stale {
            self.remove(key);
        }
        stale
    }

    /// Adds every entry of `other` that this table doesn't already have.
    pub fn merge_missing(&mut self, other: &RewriteTable) {
        for (k, v) in other.0.iter() {
            self.0.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

impl FromIterator<(String, String)> for RewriteTable {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for RewriteTable {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}
