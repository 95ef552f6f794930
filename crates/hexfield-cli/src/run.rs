use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::{RunArgs, StillArgs};
use crate::config::FileConfig;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Opens the preview window.
pub fn preview(config_override: Option<&Path>, args: RunArgs) -> Result<()> {
    let file = load_config(config_override)?;
    let renderer = file.renderer_config(&args);
    tracing::info!(
        width = renderer.surface_size.0,
        height = renderer.surface_size.1,
        fps = ?renderer.target_fps,
        vsync = renderer.vsync,
        power = %renderer.power,
        "launching hexfield preview"
    );
    hexfield::run_preview(renderer)
}

/// Renders a single frame to PNG without touching the GPU.
pub fn still(config_override: Option<&Path>, args: StillArgs) -> Result<()> {
    let file = load_config(config_override)?;
    let plan = file.still_plan(&args);
    if let Some(parent) = plan.output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    hexfield::export_png(&plan.output, plan.size, plan.time.as_secs_f32())
}

pub fn config_where(config_override: Option<&Path>) -> Result<()> {
    let paths = AppPaths::discover()?;
    let file = resolve_config_path(&paths, config_override);
    let status = if file.exists() { "present" } else { "missing" };
    println!("Configuration:");
    println!("  directory: {}", paths.config_dir().display());
    println!("  file:      {} ({status})", file.display());
    Ok(())
}

fn resolve_config_path(paths: &AppPaths, config_override: Option<&Path>) -> PathBuf {
    config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file())
}

fn load_config(config_override: Option<&Path>) -> Result<FileConfig> {
    match config_override {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            FileConfig::load(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => {
            let paths = AppPaths::discover()?;
            let path = paths.config_file();
            tracing::debug!(path = %path.display(), "loading optional configuration");
            FileConfig::load_optional(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
    }
}
