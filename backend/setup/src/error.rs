use std::{io, path::PathBuf};

use thiserror::Error;

use crate::utils::Version;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rust toolchain not found. Install it from https://rustup.rs and retry")]
    ToolchainMissing,

    #[error("Rust {found} is too old, {required} or newer is required")]
    ToolchainTooOld { found: Version, required: Version },

    #[error("Could not read a version from {0:?}")]
    UnparsableVersion(String),

    #[error("`{command}` failed: {reason}")]
    Provision { command: String, reason: String },

    #[error("Failed to render script: {0}")]
    Template(#[from] tera::Error),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl SetupError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();

        move |source| SetupError::Io {
            action,
            path,
            source,
        }
    }

    /// Every failure ends the bootstrap with the same status.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
