use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use setup::{
    SetupOptions,
    models::{DEFAULT_ENV_DIR, MIN_TOOLCHAIN},
    run_setup,
    toolchain::RustToolchain,
    utils::Version,
};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prepares a directory to run the voting server")]
struct Args {
    /// Directory holding index.html, admin.html and projector.html
    #[arg(long, default_value = ".")]
    source: PathBuf,

    /// Project root where static/, logs/ and the scripts are created
    #[arg(long, default_value = ".")]
    target: PathBuf,

    /// Dependency environment, relative to the target
    #[arg(long, default_value = DEFAULT_ENV_DIR)]
    env_dir: PathBuf,

    /// Oldest accepted Rust version
    #[arg(long, default_value = MIN_TOOLCHAIN)]
    min_toolchain: Version,

    /// Skip fetching dependencies and building the server
    #[arg(long)]
    no_build: bool,
}

fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let options = SetupOptions {
        source: args.source,
        target: args.target,
        env_dir: args.env_dir,
        min_toolchain: args.min_toolchain,
        build: !args.no_build,
    };

    match run_setup(&options, &RustToolchain) {
        Ok(report) => {
            println!("\nSetup complete.");
            println!("Start: {}", report.start_script.display());
            println!("Stop:  {}", report.stop_script.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\nError: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
