//! Cache registry and the two-tier background sweep.
//!
//! ```text
//! every sweep_interval:
//!   idle < grace_period         → keep
//!   idle > idle_timeout         → clear            (expired)
//!   rss > memory_threshold      → clear oldest     (pressured)
//!                                 until below threshold
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::Evictable;
use super::memory::{MemoryProbe, ProcStatus};

/// Sweep timings and memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub sweep_interval: Duration,
    pub grace_period: Duration,
    pub idle_timeout: Duration,
    /// Resident set size in bytes above which idle caches are shed.
    pub memory_threshold: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            grace_period: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(180),
            memory_threshold: 512 * 1024 * 1024,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Cleared for exceeding the idle timeout.
    pub expired: usize,
    /// Cleared to relieve memory pressure.
    pub pressured: usize,
    /// Registered caches still alive after the sweep.
    pub live: usize,
}

impl SweepReport {
    pub fn evicted(&self) -> usize {
        self.expired + self.pressured
    }
}

/// Weak set of every cache of one site.
pub struct CacheRegistry {
    entries: Mutex<Vec<Weak<dyn Evictable>>>,
    policy: CachePolicy,
    probe: Box<dyn MemoryProbe>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CacheRegistry {
    /// Registry measuring memory through `/proc/self/status`.
    pub fn new(policy: CachePolicy) -> Arc<Self> {
        Self::with_probe(policy, ProcStatus)
    }

    pub fn with_probe(policy: CachePolicy, probe: impl MemoryProbe + 'static) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            policy,
            probe: Box::new(probe),
            sweeper: Mutex::new(None),
        })
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub(crate) fn register(&self, cache: Weak<dyn Evictable>) {
        self.entries.lock().push(cache);
    }

    /// Number of registered caches still alive.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one sweep now.
    pub fn sweep(&self) -> SweepReport {
        let live = self.live();
        let now = Instant::now();
        let mut report = SweepReport {
            live: live.len(),
            ..SweepReport::default()
        };

        // Caches outside the grace period, with the access time we saw.
        let mut idle: Vec<(Instant, &Arc<dyn Evictable>)> = live
            .iter()
            .filter_map(|cache| cache.last_accessed().map(|seen| (seen, cache)))
            .filter(|(seen, _)| now.saturating_duration_since(*seen) >= self.policy.grace_period)
            .collect();

        idle.retain(|(seen, cache)| {
            if now.saturating_duration_since(*seen) > self.policy.idle_timeout {
                if cache.evict_if_untouched(*seen) {
                    report.expired += 1;
                }
                return false;
            }
            true
        });

        if self.over_threshold() {
            idle.sort_unstable_by_key(|(seen, _)| *seen);
            for (seen, cache) in idle {
                if cache.evict_if_untouched(seen) {
                    report.pressured += 1;
                }
                if !self.over_threshold() {
                    break;
                }
            }
        }

        if report.evicted() > 0 {
            crate::debug!("cache"; "swept {} expired, {} under pressure, {} live",
                report.expired, report.pressured, report.live);
        }
        report
    }

    /// Spawn the periodic sweep. Returns `false` if it is already running.
    ///
    /// The task holds only a weak reference and exits once the registry
    /// is dropped.
    pub fn start_sweeper(self: &Arc<Self>) -> bool {
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }

        let registry = Arc::downgrade(self);
        let period = self.policy.sweep_interval;
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep();
            }
        }));
        true
    }

    pub fn stop_sweeper(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
        }
    }

    /// Upgrade every entry, pruning the dead ones.
    fn live(&self) -> Vec<Arc<dyn Evictable>> {
        let mut entries = self.entries.lock();
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|weak| match weak.upgrade() {
            Some(cache) => {
                live.push(cache);
                true
            }
            None => false,
        });
        live
    }

    fn over_threshold(&self) -> bool {
        self.probe
            .resident_bytes()
            .is_some_and(|rss| rss > self.policy.memory_threshold)
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("live", &self.len())
            .field("policy", &self.policy)
            .finish()
    }
}
