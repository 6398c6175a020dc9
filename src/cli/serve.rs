//! `sitegraph serve`: initial build, then incremental rebuilds on change.
//!
//! ```text
//! FsWatcher ─► WatchAdapter ─► graph (debounced) ─► producers
//!                                                     ├─ <kind>:add/update ─► re-emit
//!                                                     └─ <kind>:remove     ─► delete or fall back
//! ```

use std::sync::{Arc, Weak};
use std::time::Instant;

use anyhow::{Context, Result};
use sitegraph::build::{DirEmitter, Emitter, build_producer, is_shadowed};
use sitegraph::config::EngineConfig;
use sitegraph::core::BuildMode;
use sitegraph::hooks::HookTarget;
use sitegraph::logger::{status_error, status_success};
use sitegraph::producer::{Producer, ProducerKind};
use sitegraph::site::Site;
use sitegraph::utils::plural_count;
use sitegraph::watch::{FsWatcher, WatchAdapter};
use tokio::sync::mpsc;

const KINDS: [ProducerKind; 4] = [
    ProducerKind::Asset,
    ProducerKind::Page,
    ProducerKind::VirtualAsset,
    ProducerKind::VirtualPage,
];

pub fn serve_site(config: EngineConfig) -> Result<()> {
    super::runtime()?.block_on(serve(config))
}

async fn serve(config: EngineConfig) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))?;

    let site = Arc::new(Site::builder(config, BuildMode::Serve).build());
    let emitter: Arc<dyn Emitter> = Arc::new(DirEmitter::new(&site.config().build.output));

    // Watch before the initial build so edits made during it are not lost.
    let watcher = FsWatcher::new(site.roots().all()).context("failed to start file watcher")?;
    for root in watcher.pending() {
        sitegraph::log!("watch"; "{} does not exist yet", root.display());
    }

    let started = Instant::now();
    site.scan();
    let report = site.driver().with_progress(true).run(Arc::clone(&emitter)).await?;
    sitegraph::log!(
        "serve";
        "built {} in {:.2?}",
        plural_count(report.total(), "output"),
        started.elapsed()
    );

    register_sync_hooks(&site, &emitter);
    site.caches().start_sweeper();

    let watch_task = tokio::spawn(watcher.run(WatchAdapter::new(Arc::clone(&site))));
    sitegraph::log!("watch"; "watching for changes, press Ctrl+C to stop");

    shutdown_rx.recv().await;
    sitegraph::log!("serve"; "shutting down...");

    watch_task.abort();
    site.graph().flush().await;
    site.teardown();
    Ok(())
}

/// Keep the output directory in step with producer lifecycle events.
///
/// Hooks hold the site weakly; the registry lives inside it.
fn register_sync_hooks(site: &Arc<Site>, emitter: &Arc<dyn Emitter>) {
    let hooks = site.hooks();
    for kind in KINDS {
        for event in ["add", "update"] {
            let weak = Arc::downgrade(site);
            let emitter = Arc::clone(emitter);
            hooks.register(kind.hook(event), move |target| {
                reemit(weak.clone(), Arc::clone(&emitter), target)
            });
        }

        let weak = Arc::downgrade(site);
        let emitter = Arc::clone(emitter);
        hooks.register(kind.hook("remove"), move |target| {
            unpublish(weak.clone(), Arc::clone(&emitter), target)
        });
    }
}

async fn reemit(site: Weak<Site>, emitter: Arc<dyn Emitter>, target: HookTarget) -> Result<()> {
    let (Some(site), Some(producer)) = (site.upgrade(), target.producer()) else {
        return Ok(());
    };
    if producer.is_destroyed() || is_shadowed(&site.services().routes, producer) {
        return Ok(());
    }
    rebuild(&site, emitter.as_ref(), producer).await;
    Ok(())
}

/// A removed producer's output goes away, unless a lower level serves
/// the same URL, in which case that one is emitted instead.
async fn unpublish(site: Weak<Site>, emitter: Arc<dyn Emitter>, target: HookTarget) -> Result<()> {
    let (Some(site), Some(producer)) = (site.upgrade(), target.producer()) else {
        return Ok(());
    };

    match site.find(producer.url().as_str()) {
        Some(fallback) if fallback.dist_path() == producer.dist_path() => {
            rebuild(&site, emitter.as_ref(), &fallback).await;
        }
        _ => {
            emitter.remove(&producer.dist_path()).await?;
            status_success(&format!("removed {}", producer.dist_path()));
        }
    }
    Ok(())
}

async fn rebuild(site: &Site, emitter: &dyn Emitter, producer: &Producer) {
    let started = Instant::now();
    match build_producer(producer, site.hooks(), emitter).await {
        Ok(()) => status_success(&format!(
            "rebuilt {} in {:.2?}",
            producer.url(),
            started.elapsed()
        )),
        Err(e) => status_error(&format!("failed to rebuild {}", producer.url()), &format!("{e:#}")),
    }
}
