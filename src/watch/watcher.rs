//! notify-backed watcher.
//!
//! The watcher starts immediately on construction, buffering events while
//! the caller performs the initial build, so nothing written in between is
//! lost.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jwalk::WalkDir;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{FsEvent, FsEventKind, WatchAdapter};
use crate::utils::normalize_path;

/// How often roots missing at startup are checked for.
const ATTACH_INTERVAL: Duration = Duration::from_millis(500);

/// Recursive watcher over a site's source roots.
pub struct FsWatcher {
    watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    watched: Vec<PathBuf>,
    /// Roots that didn't exist yet.
    pending: Vec<PathBuf>,
}

impl FsWatcher {
    /// Start watching every existing root; the rest are attached once they appear.
    pub fn new<I, P>(roots: I) -> notify::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res| {
            // Receiver gone means the watcher is shutting down.
            let _ = tx.send(res);
        })?;

        let mut this = Self {
            watcher,
            rx,
            watched: Vec::new(),
            pending: Vec::new(),
        };
        for root in roots {
            let root = normalize_path(root.as_ref());
            if this.watched.contains(&root) || this.pending.contains(&root) {
                continue;
            }
            if root.exists() {
                this.watcher.watch(&root, RecursiveMode::Recursive)?;
                this.watched.push(root);
            } else {
                this.pending.push(root);
            }
        }
        Ok(this)
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    pub fn pending(&self) -> &[PathBuf] {
        &self.pending
    }

    /// Watch pending roots that now exist. Their current files come back
    /// as `add` events.
    pub fn attach_pending(&mut self) -> Vec<FsEvent> {
        let mut events = Vec::new();
        let pending = std::mem::take(&mut self.pending);

        for root in pending {
            if !root.exists() {
                self.pending.push(root);
                continue;
            }
            if let Err(e) = self.watcher.watch(&root, RecursiveMode::Recursive) {
                crate::log!("watch"; "failed to watch {}: {}", root.display(), e);
                self.pending.push(root);
                continue;
            }

            crate::log!("watch"; "now watching {}", root.display());
            events.extend(
                WalkDir::new(&root)
                    .sort(true)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| !e.file_type().is_dir())
                    .map(|e| FsEvent::new(FsEventKind::Add, e.path())),
            );
            self.watched.push(root);
        }
        events
    }

    /// Next batch of translated events, or `None` once the notify side closes.
    pub async fn next(&mut self) -> Option<Vec<FsEvent>> {
        loop {
            match self.rx.recv().await? {
                Ok(event) => {
                    crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);
                    let events = FsEvent::from_notify(&event);
                    if !events.is_empty() {
                        return Some(events);
                    }
                }
                Err(e) => crate::log!("watch"; "notify error: {}", e),
            }
        }
    }

    /// Feed events into `adapter` until the notify side closes.
    ///
    /// Run it in its own task and abort the task to stop watching.
    pub async fn run(mut self, adapter: WatchAdapter) {
        let mut attach = tokio::time::interval(ATTACH_INTERVAL);
        attach.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                events = self.next() => Wake::Events(events),
                _ = attach.tick(), if !self.pending.is_empty() => Wake::Attach,
            };

            let events = match wake {
                Wake::Events(Some(events)) => events,
                Wake::Events(None) => break,
                Wake::Attach => self.attach_pending(),
            };
            if !events.is_empty() {
                adapter.handle(events);
            }
        }
    }
}

enum Wake {
    Events(Option<Vec<FsEvent>>),
    Attach,
}

impl std::fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher")
            .field("watched", &self.watched)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
