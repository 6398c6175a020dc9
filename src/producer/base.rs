//! State and behavior shared by every producer variant.

use std::sync::{Arc, Weak};

use crate::cache::{Cache, Output, tee_to_cache};
use crate::core::ResolvedUrl;
use crate::graph::{Change, ChangeKind, Dependent, DependentNode, Key};
use crate::hooks::HookTarget;
use crate::route::{Level, RouteError, RouteNode};

use super::{Content, Producer, ProducerKind, Services};

pub(super) struct ProducerBase {
    pub(super) node: DependentNode,
    pub(super) route: RouteNode<Producer>,
    pub(super) cache: Cache<Output>,
    pub(super) services: Arc<Services>,
    kind: ProducerKind,
    primary: Option<Key>,
}

impl ProducerBase {
    pub(super) fn new(
        services: &Arc<Services>,
        this: Weak<dyn Dependent>,
        kind: ProducerKind,
        level: Level,
        address: ResolvedUrl,
        primary: Option<Key>,
    ) -> Self {
        let node = DependentNode::new(&services.graph, this);
        let is_page = matches!(kind, ProducerKind::Page | ProducerKind::VirtualPage);
        let route = RouteNode::with_address(&services.routes, node.id(), level, is_page, address);
        Self {
            node,
            route,
            cache: Cache::new(&services.caches),
            services: Arc::clone(services),
            kind,
            primary,
        }
    }

    /// Claim the route slot, then subscribe to the primary source.
    ///
    /// On conflict the node is destroyed and never enters the index.
    pub(super) fn register(&self, producer: Producer) -> Result<(), RouteError> {
        if let Err(e) = self.route.register(producer) {
            self.node.destroy();
            return Err(e);
        }
        self.sync_dependencies(std::iter::empty());
        Ok(())
    }

    /// Cached output, only consulted in serve mode.
    pub(super) fn cached(&self) -> Option<Output> {
        if self.services.mode.caches_output() {
            self.cache.get()
        } else {
            None
        }
    }

    /// Epoch to hand to [`commit`](Self::commit) once computation finishes.
    pub(super) fn begin(&self) -> u64 {
        self.cache.epoch()
    }

    /// Replace the key set with `{primary} ∪ extras`.
    pub(super) fn sync_dependencies(&self, extras: impl IntoIterator<Item = Key>) {
        self.node
            .update_dependencies(self.primary.iter().cloned().chain(extras));
    }

    /// Populate the cache from fresh content (serve mode only).
    pub(super) fn commit(&self, epoch: u64, content: Content) -> Content {
        if !self.services.mode.caches_output() {
            return content;
        }
        match content {
            Content::Buffer(output) => {
                self.cache.set_if_current(epoch, Arc::clone(&output));
                Content::Buffer(output)
            }
            Content::Stream(stream) => {
                Content::Stream(tee_to_cache(stream, self.cache.clone(), epoch))
            }
        }
    }

    pub(super) fn destroy(&self) -> bool {
        if !self.node.destroy() {
            return false;
        }
        // Dropped after the table lock is released.
        let _slot = self.route.release();
        self.cache.clear();
        true
    }

    /// Default reaction to a flush: self-destroy when the primary source
    /// is removed, otherwise invalidate. Hooks run in the background.
    ///
    /// An `add` of the primary alone is the file this producer was just
    /// created from; `<kind>:add` already covers it, so nothing happens.
    pub(super) fn handle_changes(&self, changes: &[Change], producer: Option<Producer>) {
        let is_primary = |c: &Change| self.primary.as_ref() == Some(&c.key);
        if changes
            .iter()
            .all(|c| c.kind == ChangeKind::Add && is_primary(c))
        {
            return;
        }

        let primary_removed = self.primary.as_ref().is_some_and(|primary| {
            changes
                .iter()
                .any(|c| c.kind == ChangeKind::Remove && &c.key == primary)
        });

        let event = if primary_removed {
            if !self.destroy() {
                return;
            }
            crate::debug!("producer"; "{} {} removed", self.kind.name(), self.route.url());
            "remove"
        } else {
            self.cache.clear();
            "update"
        };

        if let Some(producer) = producer {
            self.services
                .hooks
                .spawn(self.kind.hook(event), HookTarget::Producer(producer));
        }
    }

    pub(super) fn describe(&self) -> String {
        format!("{} {}", self.kind.name(), self.route.url())
    }
}
