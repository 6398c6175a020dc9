//! `[paths]` section configuration.
//!
//! Source roots and the URL prefixes they publish under.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! theme_assets = "theme/assets"   # Theme-level assets (lowest precedence)
//! assets = "assets"               # User assets
//! posts = "content/posts"         # Posts, published under `posts_url`
//! pages = "content/pages"         # Pages, published under `pages_url`
//! layouts = "layouts"             # `<name>.html` layout files
//! posts_url = "/blog/"
//! pages_url = "/"
//! default_layout = "default"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Source roots, relative to the project root until finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub theme_assets: PathBuf,
    pub assets: PathBuf,
    pub posts: PathBuf,
    pub pages: PathBuf,
    pub layouts: PathBuf,

    /// URL prefix for posts.
    pub posts_url: String,

    /// URL prefix for pages.
    pub pages_url: String,

    /// Layout used when a page names none.
    pub default_layout: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            theme_assets: "theme/assets".into(),
            assets: "assets".into(),
            posts: "content/posts".into(),
            pages: "content/pages".into(),
            layouts: "layouts".into(),
            posts_url: "/blog/".into(),
            pages_url: "/".into(),
            default_layout: "default".into(),
        }
    }
}

impl PathsConfig {
    /// Every source root, for watching and scanning.
    pub fn roots(&self) -> [&PathBuf; 5] {
        [
            &self.theme_assets,
            &self.assets,
            &self.posts,
            &self.pages,
            &self.layouts,
        ]
    }
}
