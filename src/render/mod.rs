//! Default collaborators for the `sitegraph` binary.
//!
//! - [`Passthrough`]: copies asset files as-is
//! - [`MarkdownRenderer`]: `.md` pages through pulldown-cmark
//! - [`PlaceholderLayouts`]: `<name>.html` layouts with `{{ content }}`

mod markdown;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::producer::{AssetTransform, CompiledLayout, LayoutEngine, LayoutInput, Transformed};

pub use markdown::{MarkdownOptions, MarkdownRenderer};

/// Marker replaced by the page body.
pub const CONTENT_MARKER: &str = "{{ content }}";
/// Marker replaced by the page URL.
pub const URL_MARKER: &str = "{{ url }}";

/// Asset transform that reads the source unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl AssetTransform for Passthrough {
    async fn transform(&self, source: &Path) -> Result<Transformed> {
        let bytes = tokio::fs::read(source)
            .await
            .with_context(|| format!("failed to read `{}`", source.display()))?;
        Ok(Transformed::new(bytes))
    }
}

/// Layout engine with two markers and no other syntax.
///
/// A layout without `{{ content }}` is rejected at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderLayouts;

#[async_trait]
impl LayoutEngine for PlaceholderLayouts {
    async fn compile(&self, path: &Path) -> Result<CompiledLayout> {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read layout `{}`", path.display()))?;
        if !template.contains(CONTENT_MARKER) {
            anyhow::bail!("layout `{}` has no `{CONTENT_MARKER}` marker", path.display());
        }
        Ok(CompiledLayout {
            template,
            dependencies: Vec::new(),
        })
    }

    fn apply(&self, layout: &CompiledLayout, input: LayoutInput<'_>) -> Result<Vec<u8>> {
        let html = layout
            .template
            .replace(URL_MARKER, input.url.as_str())
            .replace(CONTENT_MARKER, input.body);
        Ok(html.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UrlPath;

    #[tokio::test]
    async fn test_passthrough_reads_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logo.bin");
        std::fs::write(&path, [0_u8, 159, 146, 150]).unwrap();

        let out = Passthrough.transform(&path).await.unwrap();
        let bytes = out.content.into_bytes().await.unwrap();
        assert_eq!(&*bytes, &[0_u8, 159, 146, 150]);
        assert!(out.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_layout_apply() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("default.html");
        std::fs::write(&path, "<a href=\"{{ url }}\">x</a><main>{{ content }}</main>").unwrap();

        let layout = PlaceholderLayouts.compile(&path).await.unwrap();
        let url = UrlPath::new("/blog/hi/");
        let html = PlaceholderLayouts
            .apply(&layout, LayoutInput { url: &url, body: "<p>hi</p>" })
            .unwrap();

        assert_eq!(
            String::from_utf8(html).unwrap(),
            "<a href=\"/blog/hi/\">x</a><main><p>hi</p></main>"
        );
    }

    #[tokio::test]
    async fn test_layout_without_marker_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.html");
        std::fs::write(&path, "<main></main>").unwrap();

        let err = PlaceholderLayouts.compile(&path).await.unwrap_err();
        assert!(err.to_string().contains("no `{{ content }}` marker"));
    }
}
