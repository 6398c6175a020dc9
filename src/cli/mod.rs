//! Command-line interface module.

mod args;
pub mod build;
pub mod serve;

pub use args::{BuildArgs, Cli, Commands};

use anyhow::{Context, Result};
use sitegraph::config::EngineConfig;

/// Load `sitegraph.toml` (or the `-C` file) with command-line overrides applied.
pub fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let config = EngineConfig::load(&cli.config, &cli.build_args().overrides())?;
    sitegraph::debug!("config"; "root {}", config.root().display());
    Ok(config)
}

/// Multi-threaded runtime shared by both commands.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
