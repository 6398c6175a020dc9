//! Reverse index: key → dependents that declared it.

use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;

use super::Key;
use super::node::{Dependent, DependentId};

type Bucket = FxHashMap<DependentId, Weak<dyn Dependent>>;

/// Transpose of every dependent's key set.
///
/// # Invariants
/// - `(key, id)` is present iff dependent `id` lists `key`
/// - empty buckets are removed
#[derive(Default)]
pub(super) struct ReverseIndex {
    buckets: FxHashMap<Key, Bucket>,
}

impl ReverseIndex {
    pub(super) fn link(&mut self, key: Key, id: DependentId, dependent: Weak<dyn Dependent>) {
        self.buckets.entry(key).or_default().insert(id, dependent);
    }

    /// Returns `false` if the bucket or entry was already missing.
    pub(super) fn unlink(&mut self, key: &str, id: DependentId) -> bool {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let found = bucket.remove(&id).is_some();
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        found
    }

    /// Live dependents of `key`. Entries that no longer upgrade are pruned.
    pub(super) fn resolve(&mut self, key: &str) -> Vec<Arc<dyn Dependent>> {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return Vec::new();
        };

        let mut live = Vec::with_capacity(bucket.len());
        bucket.retain(|_, weak| match weak.upgrade() {
            Some(dependent) => {
                live.push(dependent);
                true
            }
            None => false,
        });

        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        live
    }

    pub(super) fn contains(&self, key: &str, id: DependentId) -> bool {
        self.buckets
            .get(key)
            .is_some_and(|bucket| bucket.contains_key(&id))
    }

    /// Number of keys with at least one dependent.
    pub(super) fn len(&self) -> usize {
        self.buckets.len()
    }
}
