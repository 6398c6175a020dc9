//! Configuration sections of `sitegraph.toml`.

mod build;
mod cache;
mod paths;
mod watch;

pub use build::BuildConfig;
pub use cache::CacheConfig;
pub use paths::PathsConfig;
pub use watch::WatchConfig;
