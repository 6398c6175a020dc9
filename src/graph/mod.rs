//! Reactive dependency graph.
//!
//! ```text
//! emit([(key, kind)])  ──►  pending buffer  ──(debounce window)──►  flush
//!                                                                     │
//!          reverse index: key → {weak dependent}  ◄───────────────────┘
//!                                                                     │
//!          coalesce per dependent, then on_dependencies_changed() ◄───┘
//! ```
//!
//! - [`DependentNode`]: per-entity state (identity, destroyed flag, key set)
//! - [`DependencyGraph`]: reverse index, pending buffer, debounce timer
//!
//! The reverse index is always the exact transpose of every live node's
//! key set. It holds only weak references; entries whose dependent was
//! dropped are pruned the next time their key is resolved.

mod coalesce;
mod debounce;
mod dependency;
mod index;
mod node;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

pub use dependency::{DependencyGraph, FlushReport};
pub use node::{Dependent, DependentId, DependentNode};

/// Opaque dependency key. In practice a filesystem path.
pub type Key = Arc<str>;

/// Key for a filesystem path.
pub fn path_key(path: &Path) -> Key {
    Key::from(path.to_string_lossy().as_ref())
}

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Update,
    Remove,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

/// A coalesced change delivered to a dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: Key,
    pub kind: ChangeKind,
}

impl Change {
    pub fn new(key: impl Into<Key>, kind: ChangeKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }
}
