/// Rust edition 2024 needs at least this compiler.
pub const MIN_TOOLCHAIN: &str = "1.85";

pub const BIN_NAME: &str = "ballot";

pub const STATIC_DIR: &str = "static";
pub const LOGS_DIR: &str = "logs";
pub const DEFAULT_ENV_DIR: &str = "build";

pub const ASSETS: [&str; 3] = ["index.html", "admin.html", "projector.html"];

pub const START_SCRIPT: &str = "start_server.sh";
pub const STOP_SCRIPT: &str = "stop_server.sh";

/// Environment the server is always launched with: every interface, port 8000.
pub const LAUNCH_ENV: &str = "HOST=0.0.0.0 PORT=8000";

/// Matched against full command lines by `pkill -f`.
pub const STOP_PATTERN: &str = BIN_NAME;

/// `env_dir` is anchored, `./build` or an absolute path. The `shell_quote` filter quotes it.
pub const START_TEMPLATE: &str = r#"#!/usr/bin/env bash
# Starts the voting server on all interfaces, port 8000.
cd "$(dirname "$0")"

ENV_DIR={{ env_dir | shell_quote }}

if cargo watch --version >/dev/null 2>&1; then
    # Rebuilds and restarts on source changes.
    exec env {{ launch_env }} CARGO_TARGET_DIR="$ENV_DIR" cargo watch -w backend -x "run --release --bin {{ bin }}"
fi

echo "cargo watch not found, starting without auto-reload (cargo install cargo-watch)" >&2
exec env {{ launch_env }} "$ENV_DIR/release/{{ bin }}"
"#;

pub const STOP_TEMPLATE: &str = r#"#!/usr/bin/env bash
# Stops every process whose command line matches the server.
pkill -f {{ pattern | shell_quote }}
"#;
