//! Per-route address state.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{Level, RouteError, RouteTable};
use crate::core::{ResolvedUrl, UrlPath, resolve_url};
use crate::graph::DependentId;

/// Address of one route plus its handle on the shared table.
///
/// Embedded next to a [`DependentNode`](crate::graph::DependentNode) and
/// shares its id. Lock order is always `address` then the table.
pub struct RouteNode<T> {
    level: Level,
    is_page: bool,
    owner: DependentId,
    table: Arc<RouteTable<T>>,
    address: RwLock<ResolvedUrl>,
}

impl<T: Clone> RouteNode<T> {
    /// Resolve `url` without registering it yet.
    pub fn new(
        table: &Arc<RouteTable<T>>,
        owner: DependentId,
        level: Level,
        is_page: bool,
        url: &str,
    ) -> Result<Self, RouteError> {
        let address = resolve_url(url, is_page)?;
        Ok(Self::with_address(table, owner, level, is_page, address))
    }

    /// Wrap an address resolved ahead of time.
    pub fn with_address(
        table: &Arc<RouteTable<T>>,
        owner: DependentId,
        level: Level,
        is_page: bool,
        address: ResolvedUrl,
    ) -> Self {
        Self {
            level,
            is_page,
            owner,
            table: Arc::clone(table),
            address: RwLock::new(address),
        }
    }

    /// Register the resolved address with `target` as its producer.
    pub fn register(&self, target: T) -> Result<(), RouteError> {
        let address = self.address.read();
        self.table
            .claim(self.level, self.owner, None, &address, target)
    }

    /// Re-resolve and move to a new URL.
    ///
    /// On conflict both the table and this node keep their previous state.
    /// Returns `true` if the address actually changed.
    pub fn update_url(&self, url: &str, target: T) -> Result<bool, RouteError> {
        let next = resolve_url(url, self.is_page)?;
        let mut address = self.address.write();
        if *address == next {
            return Ok(false);
        }
        self.table.claim(
            self.level,
            self.owner,
            Some(&address.dist_path),
            &next,
            target,
        )?;
        *address = next;
        Ok(true)
    }

    /// Leave the table. Returns the removed target, if this node still
    /// owned its slot.
    pub fn release(&self) -> Option<T> {
        let address = self.address.read();
        self.table
            .release(self.level, self.owner, &address.dist_path)
    }

    pub fn is_registered(&self) -> bool {
        let address = self.address.read();
        self.table.owner_of(self.level, address.dist_path.as_str()) == Some(self.owner)
    }

    pub fn url(&self) -> UrlPath {
        self.address.read().url.clone()
    }

    pub fn dist_path(&self) -> UrlPath {
        self.address.read().dist_path.clone()
    }

    #[inline]
    pub fn level(&self) -> Level {
        self.level
    }

    #[inline]
    pub fn is_page(&self) -> bool {
        self.is_page
    }

    pub fn table(&self) -> &Arc<RouteTable<T>> {
        &self.table
    }
}

impl<T> std::fmt::Debug for RouteNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteNode")
            .field("level", &self.level)
            .field("owner", &self.owner)
            .field("address", &*self.address.read())
            .finish()
    }
}
