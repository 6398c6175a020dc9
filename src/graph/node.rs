//! Per-dependent state and the [`Dependent`] capability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use super::{Change, DependencyGraph, Key};

/// Process-unique identity of a dependent within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependentId(pub(super) u64);

impl std::fmt::Display for DependentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything subscribed to dependency keys.
///
/// Implementors embed a [`DependentNode`] and receive one coalesced batch
/// of changes per flush.
#[async_trait]
pub trait Dependent: Send + Sync + 'static {
    fn node(&self) -> &DependentNode;

    /// Label used in logs.
    fn describe(&self) -> String {
        format!("dependent {}", self.node().id())
    }

    async fn on_dependencies_changed(&self, changes: Vec<Change>) -> anyhow::Result<()>;
}

/// Identity, destroyed flag and declared keys of one dependent.
///
/// Built inside `Arc::new_cyclic` so it can hand the graph a weak
/// reference to its owner:
///
/// ```ignore
/// let page = Arc::new_cyclic(|weak: &Weak<Page>| {
///     let this: Weak<dyn Dependent> = weak.clone();
///     Page { node: DependentNode::new(&graph, this), .. }
/// });
/// ```
pub struct DependentNode {
    id: DependentId,
    graph: Arc<DependencyGraph>,
    this: Weak<dyn Dependent>,
    destroyed: AtomicBool,
    dependencies: Mutex<FxHashSet<Key>>,
}

impl DependentNode {
    pub fn new(graph: &Arc<DependencyGraph>, this: Weak<dyn Dependent>) -> Self {
        Self {
            id: graph.allocate_id(),
            graph: Arc::clone(graph),
            this,
            destroyed: AtomicBool::new(false),
            dependencies: Mutex::new(FxHashSet::default()),
        }
    }

    #[inline]
    pub fn id(&self) -> DependentId {
        self.id
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Snapshot of the declared keys, sorted.
    pub fn dependencies(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.dependencies.lock().iter().cloned().collect();
        keys.sort();
        keys
    }

    pub fn depends_on(&self, key: &str) -> bool {
        self.dependencies.lock().contains(key)
    }

    /// Replace the declared key set, updating the reverse index by diff.
    ///
    /// Only the owning dependent calls this. After `destroy()` any
    /// non-empty set is ignored.
    pub fn update_dependencies(&self, keys: impl IntoIterator<Item = Key>) {
        let next: FxHashSet<Key> = keys.into_iter().collect();

        let mut current = self.dependencies.lock();
        if self.is_destroyed() && !next.is_empty() {
            crate::debug!("graph"; "ignoring dependency update on destroyed {}", self.id);
            return;
        }

        let mut index = self.graph.index.lock();
        for stale in current.difference(&next) {
            if !index.unlink(stale, self.id) {
                crate::log!("warn"; "dependency index drift: `{}` had no entry for {}", stale, self.id);
            }
        }
        for fresh in next.difference(&current) {
            index.link(fresh.clone(), self.id, self.this.clone());
        }
        drop(index);

        *current = next;
    }

    /// Mark destroyed and drop every key. Returns `false` if already destroyed.
    ///
    /// No final notification is delivered to the owner.
    pub fn destroy(&self) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.update_dependencies(std::iter::empty());
        true
    }
}

impl std::fmt::Debug for DependentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependentNode")
            .field("id", &self.id)
            .field("destroyed", &self.is_destroyed())
            .field("dependencies", &self.dependencies())
            .finish()
    }
}
