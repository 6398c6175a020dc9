//! Map filesystem paths to what they produce.
//!
//! ```text
//! theme/assets/css/base.css   → Asset(theme)  /css/base.css
//! assets/app.js               → Asset(user)   /app.js
//! content/posts/hello.md      → Page(posts)   /blog/hello/
//! content/posts/hello/cover.png → Asset(user) /blog/hello/cover.png
//! content/pages/index.md      → Page(pages)   /
//! layouts/default.html        → Layout
//! ```
//!
//! When roots nest, the deepest root containing the path wins.

use std::path::{Component, Path, PathBuf};

use crate::config::PathsConfig;
use crate::core::join;
use crate::producer::{Collection, LAYOUT_EXTENSION};
use crate::route::Level;
use crate::utils::{is_temp_file, normalize_path};

/// What a source file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    Asset(Level),
    Page(Collection),
    Layout,
}

/// A classified source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub role: SourceRole,
    /// Logical URL, empty for layouts.
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    ThemeAssets,
    Assets,
    Posts,
    Pages,
    Layouts,
}

/// Source roots of one site, resolved to absolute paths.
#[derive(Debug, Clone)]
pub struct SourceRoots {
    roots: Vec<(Root, PathBuf)>,
    posts_url: String,
    pages_url: String,
}

impl SourceRoots {
    pub fn new(paths: &PathsConfig) -> Self {
        let roots = vec![
            (Root::ThemeAssets, normalize_path(&paths.theme_assets)),
            (Root::Assets, normalize_path(&paths.assets)),
            (Root::Posts, normalize_path(&paths.posts)),
            (Root::Pages, normalize_path(&paths.pages)),
            (Root::Layouts, normalize_path(&paths.layouts)),
        ];
        Self {
            roots,
            posts_url: paths.posts_url.clone(),
            pages_url: paths.pages_url.clone(),
        }
    }

    /// Every root, layouts included.
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(|(_, path)| path.as_path())
    }

    /// Roots whose files become producers.
    pub fn producer_roots(&self) -> impl Iterator<Item = &Path> {
        self.roots
            .iter()
            .filter(|(root, _)| *root != Root::Layouts)
            .map(|(_, path)| path.as_path())
    }

    /// Classify `path`. `is_page` tells whether a content file has a renderer.
    ///
    /// Paths outside every root, temp files and anything under a dot
    /// directory yield `None`.
    pub fn classify(&self, path: &Path, is_page: impl Fn(&Path) -> bool) -> Option<Source> {
        let (root, relative) = self
            .roots
            .iter()
            .filter_map(|(root, dir)| Some((*root, dir, path.strip_prefix(dir).ok()?)))
            .max_by_key(|(_, dir, _)| dir.components().count())
            .map(|(root, _, relative)| (root, relative))?;

        if relative.as_os_str().is_empty() || is_temp_file(path) || is_hidden(relative) {
            return None;
        }

        let role = match root {
            Root::Layouts => {
                let ext = path.extension().and_then(|e| e.to_str())?;
                return ext.eq_ignore_ascii_case(LAYOUT_EXTENSION).then(|| Source {
                    role: SourceRole::Layout,
                    url: String::new(),
                });
            }
            Root::ThemeAssets => SourceRole::Asset(Level::Theme),
            Root::Assets => SourceRole::Asset(Level::User),
            Root::Posts | Root::Pages => {
                let collection = if root == Root::Posts {
                    Collection::Posts
                } else {
                    Collection::Pages
                };
                if is_page(path) {
                    let prefix = self.prefix(collection);
                    return Some(Source {
                        role: SourceRole::Page(collection),
                        url: page_url(prefix, relative),
                    });
                }
                // Co-located files publish beside their pages.
                let url = join(self.prefix(collection), &url_segments(relative));
                return Some(Source {
                    role: SourceRole::Asset(Level::User),
                    url,
                });
            }
        };

        Some(Source {
            role,
            url: join("/", &url_segments(relative)),
        })
    }

    fn prefix(&self, collection: Collection) -> &str {
        match collection {
            Collection::Posts => &self.posts_url,
            Collection::Pages => &self.pages_url,
        }
    }
}

/// `prefix/<relative without extension>/`, with `index` collapsing into
/// its directory.
fn page_url(prefix: &str, relative: &Path) -> String {
    let stem = relative.with_extension("");
    let is_index = stem.file_name().is_some_and(|name| name == "index");
    let stem = if is_index {
        stem.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        stem
    };
    join(prefix, &format!("{}/", url_segments(&stem)))
}

fn url_segments(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| matches!(c, Component::Normal(s) if s.to_string_lossy().starts_with('.')))
}
