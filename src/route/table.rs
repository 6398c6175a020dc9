//! `level → {dist_path → owner}` table.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{Level, RouteError};
use crate::core::{ResolvedUrl, UrlPath, lookup_candidates, normalize};
use crate::graph::DependentId;

struct Entry<T> {
    owner: DependentId,
    url: UrlPath,
    target: T,
}

type Slots<T> = FxHashMap<UrlPath, Entry<T>>;

/// Route table shared by every route of one site.
///
/// Holds its targets strongly; a route leaves the table only through
/// [`RouteNode::release`](super::RouteNode::release) or [`drain`](Self::drain).
pub struct RouteTable<T> {
    levels: RwLock<[Slots<T>; 3]>,
}

impl<T: Clone> RouteTable<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            levels: RwLock::new(Default::default()),
        })
    }

    /// Resolve a requested URL to its producer.
    ///
    /// Levels are tried `virtual → user → theme`; within a level the
    /// literal URL first, then its `index.html` fallback.
    pub fn find(&self, url: &str) -> Option<T> {
        let candidates = lookup_candidates(&normalize(url));
        let levels = self.levels.read();
        Level::LOOKUP_ORDER.iter().find_map(|level| {
            let slots = &levels[level.slot()];
            candidates
                .iter()
                .find_map(|candidate| slots.get(candidate).map(|e| e.target.clone()))
        })
    }

    /// Exact lookup of one `(level, dist_path)` slot.
    pub fn get(&self, level: Level, dist_path: &str) -> Option<T> {
        self.levels.read()[level.slot()]
            .get(dist_path)
            .map(|e| e.target.clone())
    }

    pub fn owner_of(&self, level: Level, dist_path: &str) -> Option<DependentId> {
        self.levels.read()[level.slot()]
            .get(dist_path)
            .map(|e| e.owner)
    }

    /// Live targets at `level`, ordered by dist path.
    pub fn routes(&self, level: Level) -> Vec<T> {
        let levels = self.levels.read();
        let mut entries: Vec<(&UrlPath, &Entry<T>)> = levels[level.slot()].iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, e)| e.target.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.levels.read().iter().map(|slots| slots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every target.
    pub fn drain(&self) -> Vec<T> {
        let mut levels = self.levels.write();
        levels
            .iter_mut()
            .flat_map(|slots| slots.drain().map(|(_, e)| e.target))
            .collect()
    }

    /// Move `owner` from `previous` to `next` in one critical section.
    ///
    /// Fails without touching the table if `next.dist_path` belongs to a
    /// different owner.
    pub(super) fn claim(
        &self,
        level: Level,
        owner: DependentId,
        previous: Option<&UrlPath>,
        next: &ResolvedUrl,
        target: T,
    ) -> Result<(), RouteError> {
        let mut levels = self.levels.write();
        let slots = &mut levels[level.slot()];

        if let Some(existing) = slots.get(&next.dist_path)
            && existing.owner != owner
        {
            return Err(RouteError::Conflict {
                level,
                dist_path: next.dist_path.clone(),
                owner_url: existing.url.clone(),
            });
        }

        if let Some(previous) = previous
            && slots.get(previous).is_some_and(|e| e.owner == owner)
        {
            slots.remove(previous);
        }
        slots.insert(
            next.dist_path.clone(),
            Entry {
                owner,
                url: next.url.clone(),
                target,
            },
        );
        Ok(())
    }

    /// Remove the slot if `owner` still holds it.
    pub(super) fn release(&self, level: Level, owner: DependentId, dist_path: &UrlPath) -> Option<T> {
        let mut levels = self.levels.write();
        let slots = &mut levels[level.slot()];
        if slots.get(dist_path).is_some_and(|e| e.owner == owner) {
            slots.remove(dist_path).map(|e| e.target)
        } else {
            None
        }
    }
}

impl<T> std::fmt::Debug for RouteTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let levels = self.levels.read();
        f.debug_struct("RouteTable")
            .field("theme", &levels[0].len())
            .field("user", &levels[1].len())
            .field("virtual", &levels[2].len())
            .finish()
    }
}
