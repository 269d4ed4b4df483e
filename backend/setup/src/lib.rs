//! # Bootstrap
//!
//! Prepares a working directory to run the voting server.
//!
//! ## Steps
//!
//! 1. Check the Rust toolchain. Missing or older than the minimum stops everything, nothing is created.
//!
//! 2. Provision the dependency environment: `cargo fetch`, then a release build of the server into `build/`.
//!    Skipped with `--no-build`, the container image builds in its own stage.
//!
//! 3. Create `static/` and `logs/`.
//!
//! 4. Stage `index.html`, `admin.html` and `projector.html` from the source root into `static/`.
//!    Each page is optional, a missing one is reported and skipped.
//!
//! 5. Write `start_server.sh` and `stop_server.sh`.
//!
//! ## Notes
//! - Any failure other than a missing page exits with status 1.
//! - Rerunning is safe, directories are reused and files overwritten.
use std::{
    fs,
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub mod error;
pub mod models;
pub mod toolchain;
pub mod utils;

use error::SetupError;
use models::{ASSETS, LOGS_DIR, START_SCRIPT, STATIC_DIR, STOP_SCRIPT};
use toolchain::Toolchain;
use utils::{ScriptRenderer, Version, stage_assets, write_script};

const STEPS: u64 = 5;

pub struct SetupOptions {
    /// Where the pages are read from.
    pub source: PathBuf,
    /// Project root, everything is created here.
    pub target: PathBuf,
    /// Dependency environment, relative to `target`.
    pub env_dir: PathBuf,
    pub min_toolchain: Version,
    pub build: bool,
}

#[derive(Debug)]
pub struct SetupReport {
    pub toolchain: Version,
    pub staged: Vec<&'static str>,
    pub start_script: PathBuf,
    pub stop_script: PathBuf,
}

pub fn check_toolchain<T: Toolchain>(toolchain: &T, required: Version) -> Result<Version, SetupError> {
    let raw = toolchain.version()?.ok_or(SetupError::ToolchainMissing)?;
    let found: Version = raw.parse()?;

    if found < required {
        return Err(SetupError::ToolchainTooOld { found, required });
    }

    Ok(found)
}

pub fn run_setup<T: Toolchain>(options: &SetupOptions, toolchain: &T) -> Result<SetupReport, SetupError> {
    let pb = ProgressBar::new(STEPS);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    pb.set_message("Checking toolchain");
    let version = check_toolchain(toolchain, options.min_toolchain).inspect_err(|_| pb.abandon())?;
    pb.println(format!("Rust {version} found"));
    pb.inc(1);

    let env_dir = options.target.join(&options.env_dir);
    if options.build {
        pb.set_message("Provisioning dependency environment");
        toolchain
            .provision(&options.target, &env_dir)
            .inspect_err(|_| pb.abandon())?;
        pb.println(format!("Dependency environment ready in {}", env_dir.display()));
    } else {
        pb.println("Skipping dependency environment");
    }
    pb.inc(1);

    pb.set_message("Creating directories");
    let static_dir = options.target.join(STATIC_DIR);
    for dir in [&static_dir, &options.target.join(LOGS_DIR)] {
        create_dir(dir).inspect_err(|_| pb.abandon())?;
    }
    pb.inc(1);

    pb.set_message("Staging pages");
    let staged = stage_assets(&options.source, &static_dir).inspect_err(|_| pb.abandon())?;
    for asset in ASSETS {
        if staged.contains(&asset) {
            pb.println(format!("Copied {asset}"));
        } else {
            pb.println(format!("{asset} not found, skipped"));
        }
    }
    pb.inc(1);

    pb.set_message("Writing scripts");
    let scripts = ScriptRenderer::new().inspect_err(|_| pb.abandon())?;
    let start = scripts
        .start_script(&options.env_dir)
        .and_then(|contents| write_script(options.target.join(START_SCRIPT), &contents))
        .inspect_err(|_| pb.abandon())?;
    let stop = scripts
        .stop_script()
        .and_then(|contents| write_script(options.target.join(STOP_SCRIPT), &contents))
        .inspect_err(|_| pb.abandon())?;
    pb.inc(1);

    pb.finish_with_message("Done");

    info!(
        "Setup finished: {} pages staged, scripts at {} and {}",
        staged.len(),
        start.display(),
        stop.display()
    );

    Ok(SetupReport {
        toolchain: version,
        staged,
        start_script: start,
        stop_script: stop,
    })
}

fn create_dir(path: &Path) -> Result<(), SetupError> {
    fs::create_dir_all(path).map_err(SetupError::io("Failed to create", path))
}
