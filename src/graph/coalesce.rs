//! Per-dependent change coalescing within one flush.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::node::{Dependent, DependentId};
use super::{Change, ChangeKind, Key};

/// Net change per key for one dependent, in first-arrival order.
#[derive(Default)]
pub(super) struct PendingChanges {
    order: Vec<Key>,
    kinds: FxHashMap<Key, ChangeKind>,
}

impl PendingChanges {
    /// Apply one event:
    /// - pending remove + add → update
    /// - pending add + remove → key dropped
    /// - otherwise the newest kind wins
    pub(super) fn record(&mut self, key: &Key, kind: ChangeKind) {
        match (self.kinds.get(key).copied(), kind) {
            (Some(ChangeKind::Remove), ChangeKind::Add) => {
                self.kinds.insert(key.clone(), ChangeKind::Update);
            }
            (Some(ChangeKind::Add), ChangeKind::Remove) => {
                self.kinds.remove(key);
            }
            (Some(_), kind) => {
                self.kinds.insert(key.clone(), kind);
            }
            (None, kind) => {
                self.order.push(key.clone());
                self.kinds.insert(key.clone(), kind);
            }
        }
    }

    pub(super) fn into_changes(mut self) -> Vec<Change> {
        self.order
            .into_iter()
            .filter_map(|key| self.kinds.remove(&key).map(|kind| Change { key, kind }))
            .collect()
    }
}

/// Changes for every affected dependent of one flush.
#[derive(Default)]
pub(super) struct Batch {
    order: Vec<DependentId>,
    entries: FxHashMap<DependentId, (Arc<dyn Dependent>, PendingChanges)>,
}

impl Batch {
    pub(super) fn record(&mut self, dependent: &Arc<dyn Dependent>, key: &Key, kind: ChangeKind) {
        let id = dependent.node().id();
        let (_, pending) = self.entries.entry(id).or_insert_with(|| {
            self.order.push(id);
            (Arc::clone(dependent), PendingChanges::default())
        });
        pending.record(key, kind);
    }

    /// Dependents whose net change set is non-empty.
    pub(super) fn into_deliveries(mut self) -> Vec<(Arc<dyn Dependent>, Vec<Change>)> {
        self.order
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|(dependent, pending)| (dependent, pending.into_changes()))
            .filter(|(_, changes)| !changes.is_empty())
            .collect()
    }
}
