//! `sitegraph build`: one full batch build.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use sitegraph::build::DirEmitter;
use sitegraph::config::EngineConfig;
use sitegraph::core::BuildMode;
use sitegraph::site::Site;
use sitegraph::utils::plural_count;

pub fn build_site(config: EngineConfig) -> Result<()> {
    super::runtime()?.block_on(build(config))
}

async fn build(config: EngineConfig) -> Result<()> {
    let started = Instant::now();
    let site = Site::builder(config, BuildMode::Batch).build();

    let scanned = site.scan();
    if scanned.conflicts > 0 {
        sitegraph::log!("warn"; "skipped {}", plural_count(scanned.conflicts, "conflicting source"));
    }

    let output = site.config().build.output.clone();
    let result = site
        .driver()
        .with_progress(true)
        .run(Arc::new(DirEmitter::new(&output)))
        .await;
    site.teardown();
    let report = result?;

    sitegraph::log!(
        "build";
        "{} to {} in {:.2?}",
        plural_count(report.total(), "output"),
        output.display(),
        started.elapsed()
    );
    Ok(())
}
