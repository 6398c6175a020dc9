//! Site context: one set of registries plus the collaborators that fill them.
//!
//! Nothing here is global. Every [`Site`] owns its own dependency graph,
//! route table, cache registry, hooks and layout store, so independent
//! sites (and tests) never observe each other.

mod classify;


use std::path::{Path, PathBuf};
use std::sync::Arc;

use jwalk::WalkDir;
use rustc_hash::FxHashMap;

use crate::build::Driver;
use crate::cache::CacheRegistry;
use crate::config::EngineConfig;
use crate::core::{BuildMode, resolve_url};
use crate::graph::DependencyGraph;
use crate::hooks::HookRegistry;
use crate::producer::{
    Asset, AssetGenerator, AssetTransform, LayoutEngine, LayoutStore, Page, PageGenerator,
    PageRenderer, Producer, Services, VirtualAsset, VirtualPage,
};
use crate::render::{MarkdownRenderer, Passthrough, PlaceholderLayouts};
use crate::route::{Level, RouteError};
use crate::utils::plural_count;

pub use classify::{Source, SourceRole, SourceRoots};

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Site`].
///
/// Defaults: markdown pages for `.md`, passthrough for every other asset,
/// placeholder layouts.
pub struct SiteBuilder {
    config: EngineConfig,
    mode: BuildMode,
    transforms: FxHashMap<String, Arc<dyn AssetTransform>>,
    fallback: Option<Arc<dyn AssetTransform>>,
    renderers: FxHashMap<String, Arc<dyn PageRenderer>>,
    layouts: Arc<dyn LayoutEngine>,
    hooks: Option<Arc<HookRegistry>>,
    caches: Option<Arc<CacheRegistry>>,
}

impl SiteBuilder {
    pub fn new(config: EngineConfig, mode: BuildMode) -> Self {
        let mut renderers: FxHashMap<String, Arc<dyn PageRenderer>> = FxHashMap::default();
        renderers.insert("md".into(), Arc::new(MarkdownRenderer::default()));

        Self {
            config,
            mode,
            transforms: FxHashMap::default(),
            fallback: Some(Arc::new(Passthrough)),
            renderers,
            layouts: Arc::new(PlaceholderLayouts),
            hooks: None,
            caches: None,
        }
    }

    /// Transform for assets with `extension` (case-insensitive, no dot).
    pub fn transform(mut self, extension: &str, transform: Arc<dyn AssetTransform>) -> Self {
        self.transforms
            .insert(extension.to_ascii_lowercase(), transform);
        self
    }

    /// Transform for assets no extension-specific transform claims.
    /// `None` ignores such files.
    pub fn fallback_transform(mut self, transform: Option<Arc<dyn AssetTransform>>) -> Self {
        self.fallback = transform;
        self
    }

    /// Renderer for content files with `extension`. Content files without
    /// a renderer are published as assets.
    pub fn renderer(mut self, extension: &str, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderers
            .insert(extension.to_ascii_lowercase(), renderer);
        self
    }

    pub fn layout_engine(mut self, engine: Arc<dyn LayoutEngine>) -> Self {
        self.layouts = engine;
        self
    }

    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Use an existing cache registry (e.g. one with a custom memory probe).
    pub fn caches(mut self, caches: Arc<CacheRegistry>) -> Self {
        self.caches = Some(caches);
        self
    }

    pub fn build(self) -> Site {
        let config = Arc::new(self.config);
        let graph = DependencyGraph::new(config.debounce());
        let caches = self
            .caches
            .unwrap_or_else(|| CacheRegistry::new(config.cache_policy()));
        let layouts = LayoutStore::new(
            crate::utils::normalize_path(&config.paths.layouts),
            config.paths.default_layout.clone(),
            self.layouts,
            &graph,
            &caches,
            self.mode,
        );

        let services = Arc::new(Services {
            mode: self.mode,
            graph,
            routes: crate::route::RouteTable::new(),
            caches,
            hooks: self.hooks.unwrap_or_else(HookRegistry::new),
            layouts,
        });

        Site {
            roots: SourceRoots::new(&config.paths),
            config,
            services,
            transforms: self.transforms,
            fallback: self.fallback,
            renderers: self.renderers,
        }
    }
}

// ============================================================================
// Site
// ============================================================================

/// Result of a full source scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub added: usize,
    /// Files already served, layouts, and files nothing can produce.
    pub skipped: usize,
    pub conflicts: usize,
}

pub struct Site {
    config: Arc<EngineConfig>,
    services: Arc<Services>,
    roots: SourceRoots,
    transforms: FxHashMap<String, Arc<dyn AssetTransform>>,
    fallback: Option<Arc<dyn AssetTransform>>,
    renderers: FxHashMap<String, Arc<dyn PageRenderer>>,
}

impl Site {
    pub fn builder(config: EngineConfig, mode: BuildMode) -> SiteBuilder {
        SiteBuilder::new(config, mode)
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn mode(&self) -> BuildMode {
        self.services.mode
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.services.graph
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.services.hooks
    }

    pub fn caches(&self) -> &Arc<CacheRegistry> {
        &self.services.caches
    }

    pub fn roots(&self) -> &SourceRoots {
        &self.roots
    }

    /// Build driver bounded by `[build] max_parallel`.
    pub fn driver(&self) -> Driver {
        Driver::new(Arc::clone(&self.services), self.config.build.max_parallel)
    }

    /// Producer serving `url`, by level precedence.
    pub fn find(&self, url: &str) -> Option<Producer> {
        self.services.routes.find(url)
    }

    /// Every registered producer, lowest level first.
    pub fn producers(&self) -> Vec<Producer> {
        Level::LOOKUP_ORDER
            .iter()
            .rev()
            .flat_map(|&level| self.services.routes.routes(level))
            .collect()
    }

    /// Classify a filesystem path against the configured roots.
    pub fn classify(&self, path: &Path) -> Option<Source> {
        self.roots.classify(path, |p| self.renderer_for(p).is_some())
    }

    /// Walk every producer root and register what it contains.
    ///
    /// Conflicting files are logged and skipped.
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();

        for root in self.roots.producer_roots() {
            if !root.is_dir() {
                crate::debug!("scan"; "skipping missing root {}", root.display());
                continue;
            }

            let files: Vec<PathBuf> = WalkDir::new(root)
                .sort(true)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| !e.file_type().is_dir())
                .map(|e| e.path())
                .collect();

            for path in files {
                match self.add_path(&path) {
                    Ok(Some(_)) => report.added += 1,
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        crate::log!("error"; "{}: {}", path.display(), e);
                        report.conflicts += 1;
                    }
                }
            }
        }

        crate::debug!(
            "scan";
            "{}, {} skipped, {}",
            plural_count(report.added, "producer"),
            report.skipped,
            plural_count(report.conflicts, "conflict")
        );
        report
    }

    /// Create the producer for one source file.
    ///
    /// Returns `Ok(None)` for directories, layouts, unclassified files,
    /// files without a transform, and files that already have a producer.
    pub fn add_path(&self, path: &Path) -> Result<Option<Producer>, RouteError> {
        if !path.is_file() {
            return Ok(None);
        }
        let Some(source) = self.classify(path) else {
            return Ok(None);
        };

        match source.role {
            SourceRole::Layout => Ok(None),
            SourceRole::Asset(level) => {
                let Some(transform) = self.transform_for(path) else {
                    return Ok(None);
                };
                if self.is_served(level, &source.url, false, path) {
                    return Ok(None);
                }
                let asset = Asset::create(
                    &self.services,
                    level,
                    path.to_path_buf(),
                    &source.url,
                    transform,
                )?;
                Ok(Some(Producer::Asset(asset)))
            }
            SourceRole::Page(collection) => {
                let Some(renderer) = self.renderer_for(path) else {
                    return Ok(None);
                };
                if self.is_served(Level::User, &source.url, true, path) {
                    return Ok(None);
                }
                let page = Page::create(
                    &self.services,
                    Level::User,
                    path.to_path_buf(),
                    &source.url,
                    collection,
                    renderer,
                )?;
                Ok(Some(Producer::Page(page)))
            }
        }
    }

    pub fn add_virtual_asset(
        &self,
        url: &str,
        generator: Arc<dyn AssetGenerator>,
    ) -> Result<Producer, RouteError> {
        VirtualAsset::create(&self.services, url, generator).map(Producer::VirtualAsset)
    }

    pub fn add_virtual_page(
        &self,
        url: &str,
        generator: Arc<dyn PageGenerator>,
    ) -> Result<Producer, RouteError> {
        VirtualPage::create(&self.services, url, generator).map(Producer::VirtualPage)
    }

    /// Destroy every producer and layout, and stop the cache sweeper.
    ///
    /// The route table holds producers strongly; draining it is what lets
    /// them drop.
    pub fn teardown(&self) {
        self.services.caches.stop_sweeper();
        let producers = self.services.routes.drain();
        let count = producers.len();
        for producer in producers {
            producer.destroy();
        }
        self.services.layouts.clear();
        crate::debug!("site"; "tore down {}", plural_count(count, "producer"));
    }

    fn transform_for(&self, path: &Path) -> Option<Arc<dyn AssetTransform>> {
        extension(path)
            .and_then(|ext| self.transforms.get(&ext).cloned())
            .or_else(|| self.fallback.clone())
    }

    fn renderer_for(&self, path: &Path) -> Option<Arc<dyn PageRenderer>> {
        extension(path).and_then(|ext| self.renderers.get(&ext).cloned())
    }

    /// Whether `path` already owns the slot it would claim.
    fn is_served(&self, level: Level, url: &str, is_page: bool, path: &Path) -> bool {
        let Ok(address) = resolve_url(url, is_page) else {
            return false;
        };
        self.services
            .routes
            .get(level, address.dist_path.as_str())
            .is_some_and(|owner| owner.source() == Some(path))
    }
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("mode", &self.services.mode)
            .field("roots", &self.roots)
            .field("routes", &self.services.routes)
            .finish_non_exhaustive()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
