//! Full-site build driver.
//!
//! A build runs six phases in a fixed order:
//!
//! ```text
//! theme-assets → assets → posts → pages → virtual-assets → virtual-pages
//! ```
//!
//! Each phase is bracketed by `build:before:<phase>` / `build:after:<phase>`
//! and fans its producers out through [`run_parallel`]. Producers are staged
//! when their phase starts, so a `before` hook may still register new ones.

mod emit;
mod parallel;


use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::hooks::{HookRegistry, HookTarget};
use crate::logger::ProgressLine;
use crate::producer::{Producer, Services};
use crate::route::{Level, RouteTable};
use crate::utils::plural_count;

pub use emit::{DirEmitter, Emitter};
pub use parallel::run_parallel;

// ============================================================================
// Phases
// ============================================================================

/// One stage of a full build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    ThemeAssets,
    Assets,
    Posts,
    Pages,
    VirtualAssets,
    VirtualPages,
}

impl Phase {
    /// Execution order.
    pub const ALL: [Phase; 6] = [
        Phase::ThemeAssets,
        Phase::Assets,
        Phase::Posts,
        Phase::Pages,
        Phase::VirtualAssets,
        Phase::VirtualPages,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::ThemeAssets => "theme-assets",
            Self::Assets => "assets",
            Self::Posts => "posts",
            Self::Pages => "pages",
            Self::VirtualAssets => "virtual-assets",
            Self::VirtualPages => "virtual-pages",
        }
    }

    pub fn before_hook(self) -> String {
        format!("build:before:{}", self.name())
    }

    pub fn after_hook(self) -> String {
        format!("build:after:{}", self.name())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Outputs written per phase, in execution order.
    pub phases: Vec<(Phase, usize)>,
    /// Producers skipped because a higher level owns the same dist path.
    pub shadowed: usize,
}

impl BuildReport {
    pub fn count(&self, phase: Phase) -> usize {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map_or(0, |(_, n)| *n)
    }

    pub fn total(&self) -> usize {
        self.phases.iter().map(|(_, n)| n).sum()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Runs full builds over one site's producers.
pub struct Driver {
    services: Arc<Services>,
    max_parallel: usize,
    progress: bool,
}

impl Driver {
    pub fn new(services: Arc<Services>, max_parallel: usize) -> Self {
        Self {
            services,
            max_parallel,
            progress: false,
        }
    }

    /// Draw a per-phase progress line while building.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Run every phase in order. The first failing producer aborts the build.
    pub async fn run(&self, emitter: Arc<dyn Emitter>) -> Result<BuildReport> {
        let started = Instant::now();
        let hooks = &self.services.hooks;
        let routes = &self.services.routes;

        let progress = self.progress.then(|| {
            let counts: Vec<_> = Phase::ALL
                .iter()
                .map(|&phase| (phase.name(), stage(routes, phase).0.len()))
                .collect();
            Arc::new(ProgressLine::new(&counts))
        });

        let mut report = BuildReport::default();
        for phase in Phase::ALL {
            hooks.run(&phase.before_hook(), HookTarget::Phase(phase)).await?;

            let (producers, shadowed) = stage(routes, phase);
            report.shadowed += shadowed;

            let built = run_parallel(producers, self.max_parallel, |producer| {
                let hooks = Arc::clone(hooks);
                let emitter = Arc::clone(&emitter);
                let progress = progress.clone();
                async move {
                    build_producer(&producer, &hooks, emitter.as_ref()).await?;
                    if let Some(progress) = progress {
                        progress.inc(phase.name());
                    }
                    anyhow::Ok(())
                }
            })
            .await
            .with_context(|| format!("{phase} phase failed"))?;

            report.phases.push((phase, built.len()));
            hooks.run(&phase.after_hook(), HookTarget::Phase(phase)).await?;
        }

        if let Some(progress) = progress.and_then(Arc::into_inner) {
            progress.finish();
        }

        crate::debug!(
            "build";
            "{} ({} shadowed) in {:.2?}",
            plural_count(report.total(), "output"),
            report.shadowed,
            started.elapsed()
        );
        Ok(report)
    }
}

/// Run a full build of `site`, writing through `emitter`.
pub async fn build(site: &crate::site::Site, emitter: Arc<dyn Emitter>) -> Result<BuildReport> {
    site.driver().run(emitter).await
}

/// Build and emit one producer, bracketed by its per-producer hooks.
pub async fn build_producer(
    producer: &Producer,
    hooks: &HookRegistry,
    emitter: &dyn Emitter,
) -> Result<()> {
    let kind = producer.kind();
    let target = || HookTarget::Producer(producer.clone());

    hooks.run(&kind.hook("build:before"), target()).await?;

    let content = producer.get_content().await;
    let bytes = match content {
        Ok(content) => content.into_bytes().await,
        Err(err) => Err(err),
    }
    .with_context(|| format!("failed to build {producer:?}"))?;
    emitter.emit(&producer.dist_path(), bytes).await?;

    hooks.run(&kind.hook("build:after"), target()).await
}

/// Producers of `phase` that win their dist path, and how many were shadowed.
fn stage(routes: &RouteTable<Producer>, phase: Phase) -> (Vec<Producer>, usize) {
    let mut shadowed = 0;
    let producers = Level::LOOKUP_ORDER
        .iter()
        .rev()
        .flat_map(|&level| routes.routes(level))
        .filter(|producer| producer.phase() == phase && !producer.is_destroyed())
        .filter(|producer| {
            let hidden = is_shadowed(routes, producer);
            shadowed += usize::from(hidden);
            !hidden
        })
        .collect();
    (producers, shadowed)
}

/// Whether a higher level owns the same dist path.
pub fn is_shadowed(routes: &RouteTable<Producer>, producer: &Producer) -> bool {
    let level = producer.level();
    let dist_path = producer.dist_path();
    Level::LOOKUP_ORDER
        .iter()
        .take_while(|&&higher| higher != level)
        .any(|&higher| routes.get(higher, dist_path.as_str()).is_some())
}
