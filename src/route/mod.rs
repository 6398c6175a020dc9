//! Multi-level route registry.
//!
//! Every producer owns exactly one `(level, dist_path)` slot:
//!
//! ```text
//! find(url)
//!   ├─ virtual ─┐
//!   ├─ user    ─┼─ for each candidate: url, url/index.html
//!   └─ theme   ─┘
//! ```
//!
//! Within a level at most one live route owns a dist path. Assigning an
//! address that collides with another owner fails and leaves the table
//! untouched.

mod node;
mod table;

#[cfg(test)]
mod tests;

use crate::core::{RootNotPage, UrlPath};

pub use node::RouteNode;
pub use table::RouteTable;

/// Precedence level of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Theme,
    User,
    Virtual,
}

impl Level {
    /// Lookup precedence, highest first.
    pub const LOOKUP_ORDER: [Level; 3] = [Level::Virtual, Level::User, Level::Theme];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::User => "user",
            Self::Virtual => "virtual",
        }
    }

    #[inline]
    const fn slot(self) -> usize {
        match self {
            Self::Theme => 0,
            Self::User => 1,
            Self::Virtual => 2,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while assigning a route address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// Another live route at the same level already owns the dist path.
    #[error("{level} output `{dist_path}` is already owned by `{owner_url}`")]
    Conflict {
        level: Level,
        dist_path: UrlPath,
        owner_url: UrlPath,
    },
    #[error(transparent)]
    RootNotPage(#[from] RootNotPage),
}
