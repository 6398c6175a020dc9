//! Content producers: routes that turn a source into output bytes.
//!
//! ```text
//! Producer ─┬─ Asset         file  ── AssetTransform
//!           ├─ Page          file  ── PageRenderer ── Layout
//!           ├─ VirtualAsset  none  ── AssetGenerator
//!           └─ VirtualPage   none  ── PageGenerator ── Layout
//! ```
//!
//! Every producer is a [`Dependent`] and owns one route slot. Its key set
//! is always `{primary source} ∪ {extras of the last successful run} ∪
//! {keys of its layout}`.

mod asset;
mod base;
mod layout;
mod page;
mod transform;
mod virtual_asset;
mod virtual_page;


use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::build::Phase;
use crate::cache::{CacheRegistry, ContentStream, Output};
use crate::core::{BuildMode, UrlPath};
use crate::graph::{DependencyGraph, Dependent, DependentId, Key};
use crate::hooks::HookRegistry;
use crate::route::{Level, RouteTable};

pub use asset::Asset;
pub use layout::{LAYOUT_EXTENSION, Layout, LayoutStore};
pub use page::{Collection, Page};
pub use transform::{
    AssetGenerator, AssetTransform, CompiledLayout, GeneratedPage, LayoutEngine, LayoutInput,
    PageGenerator, PageRenderer, RenderedPage, Transformed,
};
pub use virtual_asset::VirtualAsset;
pub use virtual_page::VirtualPage;

// ============================================================================
// Content
// ============================================================================

/// Realized output: a whole buffer or a chunk stream.
pub enum Content {
    Buffer(Output),
    Stream(ContentStream),
}

impl Content {
    /// Wait for the whole output.
    pub async fn into_bytes(self) -> Result<Output> {
        match self {
            Self::Buffer(output) => Ok(output),
            Self::Stream(stream) => Ok(Output::from(stream.collect().await?)),
        }
    }
}

impl From<Output> for Content {
    fn from(output: Output) -> Self {
        Self::Buffer(output)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffer(Output::from(bytes))
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::from(text.into_bytes())
    }
}

impl From<ContentStream> for Content {
    fn from(stream: ContentStream) -> Self {
        Self::Stream(stream)
    }
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer(output) => write!(f, "Buffer({} bytes)", output.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

// ============================================================================
// Shared services
// ============================================================================

/// Registries and collaborators every producer of one site shares.
pub struct Services {
    pub mode: BuildMode,
    pub graph: Arc<DependencyGraph>,
    pub routes: Arc<RouteTable<Producer>>,
    pub caches: Arc<CacheRegistry>,
    pub hooks: Arc<HookRegistry>,
    pub layouts: Arc<LayoutStore>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("mode", &self.mode)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Producer
// ============================================================================

/// Producer variant, also the prefix of its hook names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    Asset,
    Page,
    VirtualAsset,
    VirtualPage,
}

impl ProducerKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Page => "page",
            Self::VirtualAsset => "virtual-asset",
            Self::VirtualPage => "virtual-page",
        }
    }

    /// `<kind>:<event>`, e.g. `page:update`.
    pub fn hook(self, event: &str) -> String {
        format!("{}:{}", self.name(), event)
    }
}

/// Any content producer.
#[derive(Clone)]
pub enum Producer {
    Asset(Arc<Asset>),
    Page(Arc<Page>),
    VirtualAsset(Arc<VirtualAsset>),
    VirtualPage(Arc<VirtualPage>),
}

macro_rules! each {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Producer::Asset($p) => $body,
            Producer::Page($p) => $body,
            Producer::VirtualAsset($p) => $body,
            Producer::VirtualPage($p) => $body,
        }
    };
}

impl Producer {
    /// Output bytes: fresh in batch mode, memoized in serve mode.
    pub async fn get_content(&self) -> Result<Content> {
        each!(self, p => p.get_content().await)
    }

    /// Leave the graph and the route table. Returns `false` if already gone.
    pub fn destroy(&self) -> bool {
        each!(self, p => p.base().destroy())
    }

    pub fn kind(&self) -> ProducerKind {
        match self {
            Self::Asset(_) => ProducerKind::Asset,
            Self::Page(_) => ProducerKind::Page,
            Self::VirtualAsset(_) => ProducerKind::VirtualAsset,
            Self::VirtualPage(_) => ProducerKind::VirtualPage,
        }
    }

    /// Build phase that emits this producer.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Asset(asset) if asset.base().route.level() == Level::Theme => Phase::ThemeAssets,
            Self::Asset(_) => Phase::Assets,
            Self::Page(page) => page.collection().phase(),
            Self::VirtualAsset(_) => Phase::VirtualAssets,
            Self::VirtualPage(_) => Phase::VirtualPages,
        }
    }

    pub fn id(&self) -> DependentId {
        each!(self, p => p.base().node.id())
    }

    pub fn url(&self) -> UrlPath {
        each!(self, p => p.base().route.url())
    }

    pub fn dist_path(&self) -> UrlPath {
        each!(self, p => p.base().route.dist_path())
    }

    pub fn level(&self) -> Level {
        each!(self, p => p.base().route.level())
    }

    /// Primary source file, if any.
    pub fn source(&self) -> Option<&Path> {
        match self {
            Self::Asset(asset) => Some(asset.source()),
            Self::Page(page) => Some(page.source()),
            Self::VirtualAsset(_) | Self::VirtualPage(_) => None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        each!(self, p => p.base().node.is_destroyed())
    }

    pub fn dependencies(&self) -> Vec<Key> {
        each!(self, p => p.base().node.dependencies())
    }

    pub fn is_cached(&self) -> bool {
        each!(self, p => p.base().cache.is_set())
    }

    /// Number of invalidations so far.
    pub fn cache_epoch(&self) -> u64 {
        each!(self, p => p.base().cache.epoch())
    }

    pub fn as_dependent(&self) -> Arc<dyn Dependent> {
        each!(self, p => Arc::clone(p) as Arc<dyn Dependent>)
    }

    /// Same underlying producer.
    pub fn ptr_eq(&self, other: &Producer) -> bool {
        self.id() == other.id()
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind().name(), self.url())
    }
}
