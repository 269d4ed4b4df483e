use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};

use regex::Regex;
use tera::{Context, Tera, Value};

use crate::{
    error::SetupError,
    models::{
        ASSETS, BIN_NAME, LAUNCH_ENV, START_SCRIPT, START_TEMPLATE, STOP_PATTERN, STOP_SCRIPT,
        STOP_TEMPLATE,
    },
};

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("valid version pattern"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = SetupError;

    /// Takes the first `X.Y[.Z]` found, so raw `rustc --version` output works.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let captures = VERSION_RE
            .captures(raw)
            .ok_or_else(|| SetupError::UnparsableVersion(raw.trim().to_string()))?;

        let number = |index: usize| -> Result<u32, SetupError> {
            captures
                .get(index)
                .map_or(Ok(0), |m| m.as_str().parse())
                .map_err(|_| SetupError::UnparsableVersion(raw.trim().to_string()))
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
        })
    }
}

/// Copies each known page that exists under `source` into `static_dir`.
///
/// Returns the staged names. A missing page is skipped, a failed copy is an error.
pub fn stage_assets(source: &Path, static_dir: &Path) -> Result<Vec<&'static str>, SetupError> {
    let mut staged = Vec::new();

    for asset in ASSETS {
        let from = source.join(asset);
        if !from.is_file() {
            continue;
        }

        let to = static_dir.join(asset);
        fs::copy(&from, &to).map_err(SetupError::io("Failed to copy", &from))?;
        staged.push(asset);
    }

    Ok(staged)
}

/// Renders the lifecycle scripts. Names end in `.sh`, so Tera leaves the output unescaped.
pub struct ScriptRenderer {
    tera: Tera,
}

impl ScriptRenderer {
    pub fn new() -> Result<Self, SetupError> {
        let mut tera = Tera::default();
        tera.register_filter("shell_quote", shell_quote);
        tera.add_raw_templates([(START_SCRIPT, START_TEMPLATE), (STOP_SCRIPT, STOP_TEMPLATE)])?;

        Ok(Self { tera })
    }

    pub fn start_script(&self, env_dir: &Path) -> Result<String, SetupError> {
        // Relative dirs run from the script's own directory.
        let env_dir = if env_dir.is_absolute() {
            env_dir.to_path_buf()
        } else {
            Path::new(".").join(env_dir)
        };

        let mut context = Context::new();
        context.insert("launch_env", LAUNCH_ENV);
        context.insert("env_dir", &env_dir.to_string_lossy());
        context.insert("bin", BIN_NAME);

        Ok(self.tera.render(START_SCRIPT, &context)?)
    }

    pub fn stop_script(&self) -> Result<String, SetupError> {
        let mut context = Context::new();
        context.insert("pattern", STOP_PATTERN);

        Ok(self.tera.render(STOP_SCRIPT, &context)?)
    }
}

/// Single-quotes a value for bash, `'` becomes `'\''`.
fn shell_quote(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("shell_quote expects a string"))?;

    Ok(Value::String(format!("'{}'", raw.replace('\'', r"'\''"))))
}

pub fn write_script(path: PathBuf, contents: &str) -> Result<PathBuf, SetupError> {
    fs::write(&path, contents).map_err(SetupError::io("Failed to write", &path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .map_err(SetupError::io("Failed to mark executable", &path))?;
    }

    Ok(path)
}
