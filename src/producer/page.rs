//! File-backed pages rendered through a layout.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::base::ProducerBase;
use super::{Content, Layout, LayoutInput, PageRenderer, Producer, ProducerKind, Services};
use crate::build::Phase;
use crate::core::resolve_url;
use crate::graph::{Change, Dependent, DependentNode, Key, path_key};
use crate::route::{Level, RouteError};

/// Content collection a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Posts,
    Pages,
}

impl Collection {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Pages => "pages",
        }
    }

    /// Build phase that renders this collection.
    pub const fn phase(self) -> Phase {
        match self {
            Self::Posts => Phase::Posts,
            Self::Pages => Phase::Pages,
        }
    }
}

pub struct Page {
    base: ProducerBase,
    this: Weak<Page>,
    source: PathBuf,
    collection: Collection,
    renderer: Arc<dyn PageRenderer>,
    layout: Mutex<Option<Arc<Layout>>>,
}

impl Page {
    pub fn create(
        services: &Arc<Services>,
        level: Level,
        source: PathBuf,
        url: &str,
        collection: Collection,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<Arc<Self>, RouteError> {
        let address = resolve_url(url, true)?;
        let primary = path_key(&source);

        let page = Arc::new_cyclic(|weak: &Weak<Page>| {
            let this: Weak<dyn Dependent> = weak.clone();
            Page {
                base: ProducerBase::new(
                    services,
                    this,
                    ProducerKind::Page,
                    level,
                    address,
                    Some(primary),
                ),
                this: weak.clone(),
                source,
                collection,
                renderer,
                layout: Mutex::new(None),
            }
        });
        page.base.register(Producer::Page(Arc::clone(&page)))?;
        Ok(page)
    }

    pub async fn get_content(&self) -> Result<Content> {
        if let Some(output) = self.base.cached() {
            return Ok(Content::Buffer(output));
        }

        let epoch = self.base.begin();
        let rendered = self
            .renderer
            .render(&self.source)
            .await
            .with_context(|| format!("failed to render `{}`", self.source.display()))?;

        let url = self.base.route.url();
        let input = LayoutInput {
            url: &url,
            body: &rendered.body,
        };
        let (layout, html) = self
            .base
            .services
            .layouts
            .apply(rendered.layout.as_deref(), input)
            .await?;

        let extras: Vec<Key> = rendered
            .dependencies
            .iter()
            .map(|p| path_key(p))
            .chain(layout.dependencies())
            .collect();
        self.base.sync_dependencies(extras);
        *self.layout.lock() = Some(layout);

        Ok(self.base.commit(epoch, Content::from(html)))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Layout used by the last successful render.
    pub fn layout(&self) -> Option<Arc<Layout>> {
        self.layout.lock().clone()
    }

    pub(super) fn base(&self) -> &ProducerBase {
        &self.base
    }

    fn producer(&self) -> Option<Producer> {
        self.this.upgrade().map(Producer::Page)
    }
}

/// Clear `layout` if any change touches one of its keys, ahead of the
/// layout's own notification in the same flush.
pub(super) fn invalidate_touched_layout(layout: Option<Arc<Layout>>, changes: &[Change]) {
    if let Some(layout) = layout
        && changes.iter().any(|c| layout.node().depends_on(&c.key))
    {
        layout.invalidate();
    }
}

#[async_trait]
impl Dependent for Page {
    fn node(&self) -> &DependentNode {
        &self.base.node
    }

    fn describe(&self) -> String {
        self.base.describe()
    }

    async fn on_dependencies_changed(&self, changes: Vec<Change>) -> Result<()> {
        invalidate_touched_layout(self.layout(), &changes);
        self.base.handle_changes(&changes, self.producer());
        Ok(())
    }
}
