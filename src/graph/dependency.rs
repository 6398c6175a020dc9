//! Reverse index + debounced, coalesced change delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::coalesce::Batch;
use super::debounce::Debounce;
use super::index::ReverseIndex;
use super::node::{Dependent, DependentId};
use super::{ChangeKind, Key};

type Event = (Key, ChangeKind);

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Raw events drained from the buffer.
    pub events: usize,
    /// Dependents that received a notification.
    pub notified: usize,
    /// Notifications that returned an error or panicked.
    pub failed: usize,
}

struct Pending {
    events: Vec<Event>,
    debounce: Debounce,
}

/// Dependency graph shared by every dependent of one site.
///
/// All mutation of the index and the pending buffer happens inside a
/// single lock scope with no `.await` in between.
pub struct DependencyGraph {
    pub(super) index: Mutex<ReverseIndex>,
    pending: Mutex<Pending>,
    window: Duration,
    next_id: AtomicU64,
}

impl DependencyGraph {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

    pub fn new(window: Duration) -> Arc<Self> {
        Arc::new(Self {
            index: Mutex::new(ReverseIndex::default()),
            pending: Mutex::new(Pending {
                events: Vec::new(),
                debounce: Debounce::new(),
            }),
            window,
            next_id: AtomicU64::new(1),
        })
    }

    /// Reserve a fresh id. Normally called through [`DependentNode::new`](super::DependentNode::new).
    pub fn allocate_id(&self) -> DependentId {
        DependentId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn debounce_window(&self) -> Duration {
        self.window
    }

    /// Queue events and restart the debounce timer.
    ///
    /// A burst of calls inside one window collapses into a single flush.
    /// Without a tokio runtime the events stay buffered until [`flush`](Self::flush).
    pub fn emit(self: &Arc<Self>, events: impl IntoIterator<Item = Event>) {
        let mut pending = self.pending.lock();
        let before = pending.events.len();
        pending.events.extend(events);
        if pending.events.len() == before {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            crate::debug!("graph"; "no runtime, {} events buffered", pending.events.len());
            return;
        };

        let generation = pending.debounce.rearm();
        let deadline = Instant::now() + self.window;
        let graph = Arc::clone(self);
        let timer = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(events) = graph.fire(generation) {
                graph.deliver(events).await;
            }
        });
        pending.debounce.arm(generation, deadline, timer);
    }

    /// Cancel the timer and deliver everything buffered now.
    pub async fn flush(&self) -> FlushReport {
        let events = {
            let mut pending = self.pending.lock();
            pending.debounce.cancel();
            std::mem::take(&mut pending.events)
        };
        self.deliver(events).await
    }

    /// Number of buffered raw events.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().events.len()
    }

    /// When the armed timer will fire, if any.
    pub fn next_flush(&self) -> Option<Instant> {
        self.pending.lock().debounce.deadline()
    }

    /// Live, non-destroyed dependents of `key`.
    pub fn dependents_of(&self, key: &str) -> Vec<Arc<dyn Dependent>> {
        let resolved = self.index.lock().resolve(key);
        resolved
            .into_iter()
            .filter(|d| !d.node().is_destroyed())
            .collect()
    }

    pub fn is_indexed(&self, key: &str, id: DependentId) -> bool {
        self.index.lock().contains(key, id)
    }

    /// Number of keys with at least one registered dependent.
    pub fn key_count(&self) -> usize {
        self.index.lock().len()
    }

    fn fire(&self, generation: u64) -> Option<Vec<Event>> {
        let mut pending = self.pending.lock();
        if !pending.debounce.fire(generation) {
            return None;
        }
        Some(std::mem::take(&mut pending.events))
    }

    /// Resolve affected dependents and coalesce their changes.
    fn collect(&self, events: &[Event]) -> Batch {
        let resolved: Vec<(Vec<Arc<dyn Dependent>>, &Event)> = {
            let mut index = self.index.lock();
            events
                .iter()
                .map(|event| (index.resolve(&event.0), event))
                .collect()
        };

        let mut batch = Batch::default();
        for (dependents, (key, kind)) in resolved {
            for dependent in dependents
                .iter()
                .filter(|d| !d.node().is_destroyed())
            {
                batch.record(dependent, key, *kind);
            }
        }
        batch
    }

    /// Notify every affected dependent once, concurrently. Failures are
    /// logged per dependent and never cancel the others.
    async fn deliver(&self, events: Vec<Event>) -> FlushReport {
        let mut report = FlushReport {
            events: events.len(),
            ..FlushReport::default()
        };
        if events.is_empty() {
            return report;
        }

        let deliveries = self.collect(&events).into_deliveries();
        report.notified = deliveries.len();

        let mut tasks = JoinSet::new();
        for (dependent, changes) in deliveries {
            tasks.spawn(async move {
                let result = dependent.on_dependencies_changed(changes).await;
                (dependent.describe(), result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((label, Err(e))) => {
                    report.failed += 1;
                    crate::log!("error"; "{} failed to handle changes: {:#}", label, e);
                }
                Err(e) => {
                    report.failed += 1;
                    crate::log!("error"; "change handler aborted: {}", e);
                }
            }
        }

        crate::debug!("graph"; "flushed {} events to {} dependents ({} failed)",
            report.events, report.notified, report.failed);
        report
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("keys", &self.key_count())
            .field("pending", &self.pending_len())
            .field("window", &self.window)
            .finish()
    }
}
