//! Logical URLs and dist paths.
//!
//! Every route owns two [`UrlPath`]s: the logical `url` it was registered
//! with, and the `dist_path` that names its output. Both pass through
//! [`normalize`], so two spellings of the same address always compare equal.

use std::borrow::Borrow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// File name appended to page URLs that don't already name an `.html` file.
pub const INDEX_FILE: &str = "index.html";

/// Normalized URL path.
///
/// Invariants:
/// - produced by [`normalize`]
/// - starts with `/` unless it begins with a `..` (or other dot) segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlPath(Arc<str>);

impl UrlPath {
    /// Normalize and wrap.
    pub fn new(url: &str) -> Self {
        Self(Arc::from(normalize(url)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn ends_with(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }

    /// `join(self, segment)`, normalized.
    pub fn join(&self, segment: &str) -> Self {
        Self(Arc::from(join(&self.0, segment)))
    }

    /// Path relative to an output root (leading `/` stripped).
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches('/')
    }
}

impl std::fmt::Display for UrlPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UrlPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UrlPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UrlPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for UrlPath {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for UrlPath {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Serialize for UrlPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UrlPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

/// A normalized URL together with the dist path it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: UrlPath,
    pub dist_path: UrlPath,
}

/// The root URL can only be owned by a page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` resolves to the site root, which must be a page")]
pub struct RootNotPage(pub String);

/// Normalize a URL path.
///
/// - empty segments dropped, `.` removed, `..` pops the previous segment
/// - `..` past the root is kept literally
/// - re-prefixed with `/` unless the result starts with `.`
/// - a trailing `/` in the input is preserved
pub fn normalize(url: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in url.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    let mut out = segments.join("/");
    if !out.starts_with('.') {
        out.insert(0, '/');
    }
    if url.ends_with('/') && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Join two URL fragments and normalize the result.
pub fn join(base: &str, segment: &str) -> String {
    normalize(&format!("{base}/{segment}"))
}

/// Lowercased extension of the last segment, including the dot.
fn extension(url: &str) -> Option<String> {
    let name = url.rsplit('/').next().unwrap_or(url);
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(name[idx..].to_ascii_lowercase()),
        _ => None,
    }
}

/// Resolve a URL into its normalized form and dist path.
///
/// Non-pages: the root is rejected, a trailing `/` is dropped and the
/// dist path equals the URL. Pages: `.html` URLs map to themselves, any
/// other URL maps to `<url>/index.html`.
pub fn resolve_url(url: &str, is_page: bool) -> Result<ResolvedUrl, RootNotPage> {
    let mut url = normalize(url);

    if !is_page {
        if url == "/" {
            return Err(RootNotPage(url));
        }
        if url.len() > 1 && url.ends_with('/') {
            url.pop();
        }
        let url = UrlPath(Arc::from(url));
        return Ok(ResolvedUrl {
            dist_path: url.clone(),
            url,
        });
    }

    let dist_path = if extension(&url).as_deref() == Some(".html") {
        url.clone()
    } else {
        join(&url, INDEX_FILE)
    };

    Ok(ResolvedUrl {
        url: UrlPath(Arc::from(url)),
        dist_path: UrlPath(Arc::from(dist_path)),
    })
}

/// Dist paths to try, in order, when looking up a requested URL.
pub fn lookup_candidates(url: &str) -> Vec<UrlPath> {
    let url = normalize(url);
    if url.ends_with('/') {
        return vec![UrlPath(Arc::from(join(&url, INDEX_FILE)))];
    }
    if url.ends_with(INDEX_FILE) {
        return vec![UrlPath(Arc::from(url))];
    }
    let index = join(&url, INDEX_FILE);
    vec![UrlPath(Arc::from(url)), UrlPath(Arc::from(index))]
}
