//! Filesystem watching.
//!
//! ```text
//! notify ─► FsWatcher ─► FsEvent{add|change|unlink} ─► WatchAdapter
//!                                                        ├─ add: Site::add_path
//!                                                        └─ graph.emit(add|update|remove)
//! ```
//!
//! Debouncing happens in the dependency graph, not here: the adapter
//! forwards every event as soon as it arrives.

mod watcher;


use std::path::PathBuf;
use std::sync::Arc;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

use crate::graph::{ChangeKind, Key, path_key};
use crate::hooks::HookTarget;
use crate::producer::Producer;
use crate::site::Site;
use crate::utils::{is_temp_file, normalize_path};

pub use watcher::FsWatcher;

// =============================================================================
// Events
// =============================================================================

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    Add,
    Change,
    Unlink,
}

impl FsEventKind {
    /// Graph change this maps to.
    pub const fn change_kind(self) -> ChangeKind {
        match self {
            Self::Add => ChangeKind::Add,
            Self::Change => ChangeKind::Update,
            Self::Unlink => ChangeKind::Remove,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Unlink => "unlink",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Translate one notify event.
    ///
    /// Renames split into unlink + add. Metadata-only modifications
    /// (mtime/atime/chmod noise) and editor temp files are dropped.
    pub fn from_notify(event: &notify::Event) -> Vec<FsEvent> {
        use FsEventKind::*;

        let kinds: Vec<FsEventKind> = match event.kind {
            EventKind::Create(_) => vec![Add; event.paths.len()],
            EventKind::Remove(_) => vec![Unlink; event.paths.len()],
            EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => vec![Unlink; event.paths.len()],
                RenameMode::To => vec![Add; event.paths.len()],
                RenameMode::Both => {
                    let mut kinds = vec![Add; event.paths.len()];
                    if let Some(first) = kinds.first_mut() {
                        *first = Unlink;
                    }
                    kinds
                }
                // Backends that can't tell which side this is.
                _ => event
                    .paths
                    .iter()
                    .map(|p| if p.exists() { Add } else { Unlink })
                    .collect(),
            },
            EventKind::Modify(_) => vec![Change; event.paths.len()],
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .zip(kinds)
            .filter(|(path, _)| !is_temp_file(path))
            .map(|(path, kind)| FsEvent::new(kind, normalize_path(path)))
            .collect()
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Feeds filesystem events into a site.
#[derive(Debug, Clone)]
pub struct WatchAdapter {
    site: Arc<Site>,
}

impl WatchAdapter {
    pub fn new(site: Arc<Site>) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    /// Create producers for new files, then emit every event to the graph.
    ///
    /// Returns the producers created. `<kind>:add` hooks run in the
    /// background.
    pub fn handle(&self, events: impl IntoIterator<Item = FsEvent>) -> Vec<Producer> {
        let mut created = Vec::new();
        let mut changes: Vec<(Key, ChangeKind)> = Vec::new();

        for event in events {
            crate::debug!("watch"; "{}: {}", event.kind.label(), event.path.display());

            if event.kind == FsEventKind::Add {
                match self.site.add_path(&event.path) {
                    Ok(Some(producer)) => {
                        self.site.hooks().spawn(
                            producer.kind().hook("add"),
                            HookTarget::Producer(producer.clone()),
                        );
                        created.push(producer);
                    }
                    Ok(None) => {}
                    Err(e) => crate::log!("error"; "{}: {}", event.path.display(), e),
                }
            }

            changes.push((path_key(&event.path), event.kind.change_kind()));
        }

        if !changes.is_empty() {
            self.site.graph().emit(changes);
        }
        created
    }
}
