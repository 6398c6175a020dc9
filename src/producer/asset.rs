//! File-backed assets (stylesheets, scripts, images, ...).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::base::ProducerBase;
use super::{AssetTransform, Content, Producer, ProducerKind, Services};
use crate::core::resolve_url;
use crate::graph::{Change, Dependent, DependentNode, path_key};
use crate::route::{Level, RouteError};

pub struct Asset {
    base: ProducerBase,
    this: Weak<Asset>,
    source: PathBuf,
    transform: Arc<dyn AssetTransform>,
}

impl Asset {
    /// Create and register an asset for `source` at `url`.
    pub fn create(
        services: &Arc<Services>,
        level: Level,
        source: PathBuf,
        url: &str,
        transform: Arc<dyn AssetTransform>,
    ) -> Result<Arc<Self>, RouteError> {
        let address = resolve_url(url, false)?;
        let primary = path_key(&source);

        let asset = Arc::new_cyclic(|weak: &Weak<Asset>| {
            let this: Weak<dyn Dependent> = weak.clone();
            Asset {
                base: ProducerBase::new(
                    services,
                    this,
                    ProducerKind::Asset,
                    level,
                    address,
                    Some(primary),
                ),
                this: weak.clone(),
                source,
                transform,
            }
        });
        asset.base.register(Producer::Asset(Arc::clone(&asset)))?;
        Ok(asset)
    }

    pub async fn get_content(&self) -> Result<Content> {
        if let Some(output) = self.base.cached() {
            return Ok(Content::Buffer(output));
        }

        let epoch = self.base.begin();
        let transformed = self
            .transform
            .transform(&self.source)
            .await
            .with_context(|| format!("failed to transform `{}`", self.source.display()))?;

        self.base
            .sync_dependencies(transformed.dependencies.iter().map(|p| path_key(p)));
        Ok(self.base.commit(epoch, transformed.content))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub(super) fn base(&self) -> &ProducerBase {
        &self.base
    }

    fn producer(&self) -> Option<Producer> {
        self.this.upgrade().map(Producer::Asset)
    }
}

#[async_trait]
impl Dependent for Asset {
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
