// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lumen script runner.
//!
//! Usage: `lumen_runner [settings.ron]`

use lumen_runner::settings::SETTINGS_FILE_NAME;
use lumen_runner::{Runner, RunnerError, RunnerSettings};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lumen_runner=debug,lumen_nodescript=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lumen runner v{}", env!("CARGO_PKG_VERSION"));

    let settings_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(SETTINGS_FILE_NAME), PathBuf::from);

    if let Err(e) = run(&settings_path) {
        tracing::error!("Runner stopped: {e}");
        std::process::exit(1);
    }
}

fn run(settings_path: &Path) -> Result<(), RunnerError> {
    let settings = RunnerSettings::load(settings_path)?;
    let base_dir = settings_path.parent().unwrap_or_else(|| Path::new("."));
    let runner = Runner::new(settings, base_dir)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RunnerError::Runtime)?;
    let summary = runtime.block_on(runner.run());

    tracing::info!(
        "Ran {} frames ({} with failures, {} skipped)",
        summary.frames,
        summary.failed_passes,
        summary.skipped_passes
    );
    Ok(())
}
