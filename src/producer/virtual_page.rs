//! Synthetic pages whose URL may follow their data.

use std::sync::{Arc, Weak};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::base::ProducerBase;
use super::page::invalidate_touched_layout;
use super::{Content, Layout, LayoutInput, PageGenerator, Producer, ProducerKind, Services};
use crate::core::resolve_url;
use crate::graph::{Change, Dependent, DependentNode, Key, path_key};
use crate::route::{Level, RouteError};

pub struct VirtualPage {
    base: ProducerBase,
    this: Weak<VirtualPage>,
    generator: Arc<dyn PageGenerator>,
    layout: Mutex<Option<Arc<Layout>>>,
}

impl VirtualPage {
    pub fn create(
        services: &Arc<Services>,
        url: &str,
        generator: Arc<dyn PageGenerator>,
    ) -> Result<Arc<Self>, RouteError> {
        let address = resolve_url(url, true)?;
        let page = Arc::new_cyclic(|weak: &Weak<VirtualPage>| {
            let this: Weak<dyn Dependent> = weak.clone();
            VirtualPage {
                base: ProducerBase::new(
                    services,
                    this,
                    ProducerKind::VirtualPage,
                    Level::Virtual,
                    address,
                    None,
                ),
                this: weak.clone(),
                generator,
                layout: Mutex::new(None),
            }
        });
        page.base
            .register(Producer::VirtualPage(Arc::clone(&page)))?;
        Ok(page)
    }

    pub async fn get_content(&self) -> Result<Content> {
        if let Some(output) = self.base.cached() {
            return Ok(Content::Buffer(output));
        }

        let epoch = self.base.begin();
        let generated = self
            .generator
            .generate()
            .await
            .with_context(|| format!("failed to generate {}", self.base.route.url()))?;

        if let Some(next) = generated.url.as_deref() {
            self.update_url(next)?;
        }

        let url = self.base.route.url();
        let input = LayoutInput {
            url: &url,
            body: &generated.body,
        };
        let (layout, html) = self
            .base
            .services
            .layouts
            .apply(generated.layout.as_deref(), input)
            .await?;

        let extras: Vec<Key> = generated
            .dependencies
            .iter()
            .map(|p| path_key(p))
            .chain(layout.dependencies())
            .collect();
        self.base.sync_dependencies(extras);
        *self.layout.lock() = Some(layout);

        Ok(self.base.commit(epoch, Content::from(html)))
    }

    /// Move to the URL the generator reported.
    ///
    /// Fails with [`RouteError::Conflict`] if another virtual route owns it.
    pub fn update_url(&self, url: &str) -> Result<bool> {
        if self.base.node.is_destroyed() {
            return Ok(false);
        }
        let producer = self
            .producer()
            .ok_or_else(|| anyhow!("virtual page {} is being dropped", self.base.route.url()))?;
        let previous = self.base.route.url();
        let moved = self.base.route.update_url(url, producer)?;
        if moved {
            crate::debug!("producer"; "virtual page moved {} -> {}", previous, self.base.route.url());
        }
        Ok(moved)
    }

    pub fn layout(&self) -> Option<Arc<Layout>> {
        self.layout.lock().clone()
    }

    pub(super) fn base(&self) -> &ProducerBase {
        &self.base
    }

    fn producer(&self) -> Option<Producer> {
        self.this.upgrade().map(Producer::VirtualPage)
    }
}

#[async_trait]
impl Dependent for VirtualPage {
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
