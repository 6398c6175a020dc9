//! Markdown pages via pulldown-cmark.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pulldown_cmark::{Options, Parser, html};

use crate::producer::{PageRenderer, RenderedPage};

/// Options for markdown conversion
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    /// Enable tables extension
    pub tables: bool,
    /// Enable footnotes extension
    pub footnotes: bool,
    /// Enable strikethrough extension
    pub strikethrough: bool,
    /// Enable task lists extension
    pub task_lists: bool,
    /// Enable heading attributes extension (e.g., `# Heading {#custom-id}`)
    pub heading_attributes: bool,
}

impl MarkdownOptions {
    /// Create options with all extensions enabled
    pub fn all() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            heading_attributes: true,
        }
    }

    fn to_pulldown_options(&self) -> Options {
        let mut opts = Options::empty();
        if self.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            opts.insert(Options::ENABLE_TASKLISTS);
        }
        if self.heading_attributes {
            opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        opts
    }
}

/// Renders `.md` files to HTML bodies.
///
/// A first line of the form `<!-- layout: name -->` selects a layout;
/// otherwise the default layout applies.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: MarkdownOptions,
}

impl MarkdownRenderer {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn to_html(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options.to_pulldown_options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(MarkdownOptions::all())
    }
}

#[async_trait]
impl PageRenderer for MarkdownRenderer {
    async fn render(&self, source: &Path) -> Result<RenderedPage> {
        let text = tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("failed to read `{}`", source.display()))?;
        let (layout, markdown) = split_layout_directive(&text);

        Ok(RenderedPage {
            body: self.to_html(markdown),
            layout: layout.map(str::to_owned),
            dependencies: Vec::new(),
        })
    }
}

/// `<!-- layout: name -->` on the first line.
fn split_layout_directive(text: &str) -> (Option<&str>, &str) {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let name = first
        .trim()
        .strip_prefix("<!--")
        .and_then(|s| s.strip_suffix("-->"))
        .and_then(|s| s.trim().strip_prefix("layout:"))
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match name {
        Some(name) => (Some(name), rest),
        None => (None, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_html_with_extensions() {
        let renderer = MarkdownRenderer::default();
        let html = renderer.to_html("# Title\n\n~~old~~ text\n");

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<del>old</del>"));
    }

    #[test]
    fn test_strikethrough_disabled() {
        let renderer = MarkdownRenderer::new(MarkdownOptions::default());
        assert!(!renderer.to_html("~~old~~").contains("<del>"));
    }

    #[test]
    fn test_layout_directive() {
        assert_eq!(
            split_layout_directive("<!-- layout: post -->\n# Hi\n"),
            (Some("post"), "# Hi\n")
        );
        assert_eq!(split_layout_directive("# Hi\n"), (None, "# Hi\n"));
        assert_eq!(
            split_layout_directive("<!-- just a note -->\n"),
            (None, "<!-- just a note -->\n")
        );
    }

    #[tokio::test]
    async fn test_render_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("post.md");
        std::fs::write(&path, "<!-- layout: wide -->\nHello *world*\n").unwrap();

        let page = MarkdownRenderer::default().render(&path).await.unwrap();
        assert_eq!(page.layout.as_deref(), Some("wide"));
        assert_eq!(page.body.trim(), "<p>Hello <em>world</em></p>");
    }

    #[tokio::test]
    async fn test_render_missing_file() {
        let err = MarkdownRenderer::default()
            .render(Path::new("/no/such/post.md"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/no/such/post.md"));
    }
}
