//! Synthetic assets with no source file.

use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::base::ProducerBase;
use super::{AssetGenerator, Content, Producer, ProducerKind, Services};
use crate::core::resolve_url;
use crate::graph::{Change, Dependent, DependentNode, path_key};
use crate::route::{Level, RouteError};

pub struct VirtualAsset {
    base: ProducerBase,
    this: Weak<VirtualAsset>,
    generator: Arc<dyn AssetGenerator>,
}

impl VirtualAsset {
    pub fn create(
        services: &Arc<Services>,
        url: &str,
        generator: Arc<dyn AssetGenerator>,
    ) -> Result<Arc<Self>, RouteError> {
        let address = resolve_url(url, false)?;
        let asset = Arc::new_cyclic(|weak: &Weak<VirtualAsset>| {
            let this: Weak<dyn Dependent> = weak.clone();
            VirtualAsset {
                base: ProducerBase::new(
                    services,
                    this,
                    ProducerKind::VirtualAsset,
                    Level::Virtual,
                    address,
                    None,
                ),
                this: weak.clone(),
                generator,
            }
        });
        asset
            .base
            .register(Producer::VirtualAsset(Arc::clone(&asset)))?;
        Ok(asset)
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

        self.base
            .sync_dependencies(generated.dependencies.iter().map(|p| path_key(p)));
        Ok(self.base.commit(epoch, generated.content))
    }

    pub(super) fn base(&self) -> &ProducerBase {
        &self.base
    }

    fn producer(&self) -> Option<Producer> {
        self.this.upgrade().map(Producer::VirtualAsset)
    }
}

#[async_trait]
impl Dependent for VirtualAsset {
    fn node(&self) -> &DependentNode {
        &self.base.node
    }

    fn describe(&self) -> String {
        self.base.describe()
    }

    async fn on_dependencies_changed(&self, changes: Vec<Change>) -> Result<()> {
        self.base.handle_changes(&changes, self.producer());
        Ok(())
    }
}
