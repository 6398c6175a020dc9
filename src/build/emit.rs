//! Output sinks.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;

use crate::cache::Output;
use crate::core::UrlPath;

/// Where realized outputs go.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Write `bytes` at `dist_path`, replacing any previous output.
    async fn emit(&self, dist_path: &UrlPath, bytes: Output) -> Result<()>;

    /// Delete the output at `dist_path`. Missing outputs are not an error.
    async fn remove(&self, dist_path: &UrlPath) -> Result<()>;
}

/// Writes outputs under a directory.
#[derive(Debug, Clone)]
pub struct DirEmitter {
    root: PathBuf,
}

impl DirEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a dist path. Paths escaping the root are rejected.
    pub fn target(&self, dist_path: &UrlPath) -> Result<PathBuf> {
        let relative = Path::new(dist_path.relative());
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("refusing to write outside the output directory: `{dist_path}`");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Emitter for DirEmitter {
    async fn emit(&self, dist_path: &UrlPath, bytes: Output) -> Result<()> {
        let target = self.target(dist_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        tokio::fs::write(&target, &*bytes)
            .await
            .with_context(|| format!("failed to write `{}`", target.display()))
    }

    async fn remove(&self, dist_path: &UrlPath) -> Result<()> {
        let target = self.target(dist_path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove `{}`", target.display()))
            }
        }
    }
}
