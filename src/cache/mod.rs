//! Single-slot memoizing caches with idle and pressure eviction.
//!
//! Each [`Cache`] registers a weak handle with a [`CacheRegistry`]; the
//! registry's sweeper reaches every live cache without keeping it alive.

mod memory;
mod registry;
mod tee;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::time::Instant;

pub use memory::{MemoryProbe, ProcStatus};
pub use registry::{CachePolicy, CacheRegistry, SweepReport};
pub use tee::{ChunkResult, ContentStream, tee_to_cache};

/// Realized output of a producer.
pub type Output = Arc<[u8]>;

/// What the sweeper needs from a cache.
pub(crate) trait Evictable: Send + Sync {
    /// `None` while empty (never idle-evictable).
    fn last_accessed(&self) -> Option<Instant>;

    /// Clear the value unless it was touched after `seen`.
    fn evict_if_untouched(&self, seen: Instant) -> bool;
}

struct State<T> {
    value: Option<T>,
    last_accessed: Option<Instant>,
    epoch: u64,
}

struct Slot<T> {
    state: Mutex<State<T>>,
}

impl<T: Send> Evictable for Slot<T> {
    fn last_accessed(&self) -> Option<Instant> {
        self.state.lock().last_accessed
    }

    fn evict_if_untouched(&self, seen: Instant) -> bool {
        let mut state = self.state.lock();
        if state.last_accessed != Some(seen) {
            return false;
        }
        state.value = None;
        state.last_accessed = None;
        true
    }
}

/// Memoized value of type `T`.
///
/// Clones share one slot. The slot lives as long as any clone does.
pub struct Cache<T> {
    slot: Arc<Slot<T>>,
}

impl<T: Clone + Send + 'static> Cache<T> {
    pub fn new(registry: &CacheRegistry) -> Self {
        let slot = Arc::new(Slot {
            state: Mutex::new(State {
                value: None,
                last_accessed: None,
                epoch: 0,
            }),
        });
        let weak = Arc::downgrade(&slot);
        registry.register(weak as Weak<dyn Evictable>);
        Self { slot }
    }

    /// Current value, refreshing the access time if present.
    pub fn get(&self) -> Option<T> {
        let mut state = self.slot.state.lock();
        let value = state.value.clone()?;
        state.last_accessed = Some(Instant::now());
        Some(value)
    }

    pub fn set(&self, value: T) {
        let mut state = self.slot.state.lock();
        state.value = Some(value);
        state.last_accessed = Some(Instant::now());
    }

    /// Drop the value and start a new epoch.
    pub fn clear(&self) {
        let mut state = self.slot.state.lock();
        state.value = None;
        state.last_accessed = None;
        state.epoch += 1;
    }

    /// Invalidation counter; read it before computing a value.
    pub fn epoch(&self) -> u64 {
        self.slot.state.lock().epoch
    }

    /// Store `value` only if no `clear()` happened since `epoch` was read.
    pub fn set_if_current(&self, epoch: u64, value: T) -> bool {
        let mut state = self.slot.state.lock();
        if state.epoch != epoch {
            return false;
        }
        state.value = Some(value);
        state.last_accessed = Some(Instant::now());
        true
    }

    pub fn is_set(&self) -> bool {
        self.slot.state.lock().value.is_some()
    }

    pub fn last_accessed(&self) -> Option<Instant> {
        self.slot.state.lock().last_accessed
    }
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.slot.state.lock();
        f.debug_struct("Cache")
            .field("set", &state.value.is_some())
            .field("epoch", &state.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests;
