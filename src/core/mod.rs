//! Core types shared by every layer of the engine.

mod mode;
mod url;

pub use mode::BuildMode;
pub use url::{
    INDEX_FILE, ResolvedUrl, RootNotPage, UrlPath, join, lookup_candidates, normalize,
    resolve_url,
};
