//! Layouts: cached, independently invalidated page templates.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{CompiledLayout, LayoutEngine, LayoutInput};
use crate::cache::{Cache, CacheRegistry};
use crate::core::BuildMode;
use crate::graph::{Change, ChangeKind, DependencyGraph, Dependent, DependentNode, Key, path_key};

/// Extension of layout files under the layouts directory.
pub const LAYOUT_EXTENSION: &str = "html";

/// One layout file and its compiled form.
///
/// A page composes its layout: the layout's keys are part of the page's
/// key set, so a template edit reaches both.
pub struct Layout {
    node: DependentNode,
    name: String,
    path: PathBuf,
    primary: Key,
    engine: Arc<dyn LayoutEngine>,
    cache: Cache<Arc<CompiledLayout>>,
    mode: BuildMode,
}

impl Layout {
    fn create(store: &LayoutStore, name: &str) -> Arc<Self> {
        let path = store.path_for(name);
        let primary = path_key(&path);
        let layout = Arc::new_cyclic(|weak: &Weak<Layout>| {
            let this: Weak<dyn Dependent> = weak.clone();
            Layout {
                node: DependentNode::new(&store.graph, this),
                name: name.to_owned(),
                path,
                primary,
                engine: Arc::clone(&store.engine),
                cache: Cache::new(&store.caches),
                mode: store.mode,
            }
        });
        layout.node.update_dependencies([layout.primary.clone()]);
        layout
    }

    /// Compiled template, memoized in serve mode.
    pub async fn compiled(&self) -> Result<Arc<CompiledLayout>> {
        if self.mode.caches_output()
            && let Some(compiled) = self.cache.get()
        {
            return Ok(compiled);
        }

        let epoch = self.cache.epoch();
        let compiled = self
            .engine
            .compile(&self.path)
            .await
            .with_context(|| format!("failed to compile layout `{}`", self.name))?;
        let compiled = Arc::new(compiled);

        let extras = compiled.dependencies.iter().map(|p| path_key(p));
        self.node
            .update_dependencies(std::iter::once(self.primary.clone()).chain(extras));
        if self.mode.caches_output() {
            self.cache.set_if_current(epoch, Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    pub fn invalidate(&self) {
        self.cache.clear();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current key set: the layout file plus whatever it included.
    pub fn dependencies(&self) -> Vec<Key> {
        self.node.dependencies()
    }

    pub fn is_destroyed(&self) -> bool {
        self.node.is_destroyed()
    }
}

#[async_trait]
impl Dependent for Layout {
    fn node(&self) -> &DependentNode {
        &self.node
    }

    fn describe(&self) -> String {
        format!("layout {}", self.name)
    }

    async fn on_dependencies_changed(&self, changes: Vec<Change>) -> Result<()> {
        let removed = changes
            .iter()
            .any(|c| c.kind == ChangeKind::Remove && c.key == self.primary);
        if removed {
            self.node.destroy();
            crate::debug!("layout"; "`{}` removed", self.name);
        }
        self.cache.clear();
        Ok(())
    }
}

/// Layouts by name, created on first use and recreated after removal.
pub struct LayoutStore {
    dir: PathBuf,
    default: String,
    engine: Arc<dyn LayoutEngine>,
    graph: Arc<DependencyGraph>,
    caches: Arc<CacheRegistry>,
    mode: BuildMode,
    layouts: Mutex<FxHashMap<String, Arc<Layout>>>,
}

impl LayoutStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        default: impl Into<String>,
        engine: Arc<dyn LayoutEngine>,
        graph: &Arc<DependencyGraph>,
        caches: &Arc<CacheRegistry>,
        mode: BuildMode,
    ) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.into(),
            default: default.into(),
            engine,
            graph: Arc::clone(graph),
            caches: Arc::clone(caches),
            mode,
            layouts: Mutex::new(FxHashMap::default()),
        })
    }

    /// Live layout for `name`, creating it if missing or destroyed.
    pub fn get(&self, name: &str) -> Arc<Layout> {
        let mut layouts = self.layouts.lock();
        if let Some(layout) = layouts.get(name)
            && !layout.is_destroyed()
        {
            return Arc::clone(layout);
        }
        let layout = Layout::create(self, name);
        layouts.insert(name.to_owned(), Arc::clone(&layout));
        layout
    }

    /// Compile `name` (or the default layout) and apply it.
    pub async fn apply(
        &self,
        name: Option<&str>,
        input: LayoutInput<'_>,
    ) -> Result<(Arc<Layout>, Vec<u8>)> {
        let layout = self.get(name.unwrap_or(&self.default));
        let compiled = layout.compiled().await?;
        let html = self
            .engine
            .apply(&compiled, input)
            .with_context(|| format!("failed to apply layout `{}` to {}", layout.name, input.url))?;
        Ok((layout, html))
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{LAYOUT_EXTENSION}"))
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destroy every layout.
    pub fn clear(&self) {
        let layouts: Vec<Arc<Layout>> = self.layouts.lock().drain().map(|(_, l)| l).collect();
        for layout in layouts {
            layout.node.destroy();
        }
    }
}

impl std::fmt::Debug for LayoutStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutStore")
            .field("dir", &self.dir)
            .field("default", &self.default)
            .field("loaded", &self.layouts.lock().len())
            .finish()
    }
}
