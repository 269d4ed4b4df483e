use std::{
    io::ErrorKind,
    path::Path,
    process::{Command, Output},
};

use tracing::debug;

use crate::{error::SetupError, models::BIN_NAME};

/// What the bootstrap needs from the host toolchain.
pub trait Toolchain {
    /// Raw version string, or `None` when the toolchain is not installed.
    fn version(&self) -> Result<Option<String>, SetupError>;

    /// Fetches dependencies and builds the server into `env_dir`.
    fn provision(&self, project_root: &Path, env_dir: &Path) -> Result<(), SetupError>;
}

pub struct RustToolchain;

impl Toolchain for RustToolchain {
    fn version(&self) -> Result<Option<String>, SetupError> {
        match Command::new("rustc").arg("--version").output() {
            Ok(output) if output.status.success() => {
                Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SetupError::Provision {
                command: "rustc --version".to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn provision(&self, project_root: &Path, env_dir: &Path) -> Result<(), SetupError> {
        run(Command::new("cargo").arg("fetch").current_dir(project_root))?;

        run(Command::new("cargo")
            .args(["build", "--release", "--bin", BIN_NAME, "--target-dir"])
            .arg(env_dir)
            .current_dir(project_root))
    }
}

fn run(command: &mut Command) -> Result<(), SetupError> {
    let command_line = describe(command);
    debug!("Running {command_line}");

    let output = command.output().map_err(|e| SetupError::Provision {
        command: command_line.clone(),
        reason: e.to_string(),
    })?;

    check(command_line, output)
}

fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

fn check(command: String, output: Output) -> Result<(), SetupError> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| output.status.to_string());

    Err(SetupError::Provision { command, reason })
}
