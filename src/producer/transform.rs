//! Pluggable collaborators that turn sources into content.
//!
//! The engine never parses or renders anything itself. Each producer
//! delegates to one of these traits and only tracks the dependencies
//! they report.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use super::Content;
use crate::core::UrlPath;

/// Output of an asset transform.
pub struct Transformed {
    pub content: Content,
    /// Files read besides the primary source.
    pub dependencies: Vec<PathBuf>,
}

impl Transformed {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = PathBuf>) -> Self {
        self.dependencies.extend(deps);
        self
    }
}

/// Source file → asset bytes, selected by file extension.
#[async_trait]
pub trait AssetTransform: Send + Sync {
    async fn transform(&self, source: &Path) -> Result<Transformed>;
}

/// A page body before layout.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub body: String,
    /// Layout name; `None` selects the default layout.
    pub layout: Option<String>,
    pub dependencies: Vec<PathBuf>,
}

/// Source file → page body, selected by file extension.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, source: &Path) -> Result<RenderedPage>;
}

/// A compiled layout template.
#[derive(Debug, Clone, Default)]
pub struct CompiledLayout {
    pub template: String,
    pub dependencies: Vec<PathBuf>,
}

/// What a layout is applied to.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub url: &'a UrlPath,
    pub body: &'a str,
}

#[async_trait]
pub trait LayoutEngine: Send + Sync {
    async fn compile(&self, path: &Path) -> Result<CompiledLayout>;

    fn apply(&self, layout: &CompiledLayout, input: LayoutInput<'_>) -> Result<Vec<u8>>;
}

/// Synthetic asset content (feeds, sitemaps, search indexes, ...).
#[async_trait]
pub trait AssetGenerator: Send + Sync {
    async fn generate(&self) -> Result<Transformed>;
}

/// A synthetic page body.
#[derive(Debug, Clone, Default)]
pub struct GeneratedPage {
    /// New URL when the page's address depends on its data.
    pub url: Option<String>,
    pub body: String,
    pub layout: Option<String>,
    pub dependencies: Vec<PathBuf>,
}

#[async_trait]
pub trait PageGenerator: Send + Sync {
    async fn generate(&self) -> Result<GeneratedPage>;
}
