use std::{
    cell::Cell,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use setup::{
    SetupOptions, check_toolchain,
    error::SetupError,
    models::{DEFAULT_ENV_DIR, MIN_TOOLCHAIN},
    run_setup,
    toolchain::Toolchain,
};
use tempfile::{TempDir, tempdir};

struct FakeToolchain {
    version: Option<&'static str>,
    provisioned: Cell<bool>,
}

impl FakeToolchain {
    fn new(version: Option<&'static str>) -> Self {
        Self {
            version,
            provisioned: Cell::new(false),
        }
    }
}

impl Toolchain for FakeToolchain {
    fn version(&self) -> Result<Option<String>, SetupError> {
        Ok(self.version.map(ToString::to_string))
    }

    fn provision(&self, _project_root: &Path, env_dir: &Path) -> Result<(), SetupError> {
        self.provisioned.set(true);
        fs::create_dir_all(env_dir.join("release")).map_err(SetupError::io("Failed to create", env_dir))
    }
}

struct FailingToolchain;

impl Toolchain for FailingToolchain {
    fn version(&self) -> Result<Option<String>, SetupError> {
        Ok(Some("rustc 1.90.0".to_string()))
    }

    fn provision(&self, _project_root: &Path, _env_dir: &Path) -> Result<(), SetupError> {
        Err(SetupError::Provision {
            command: "cargo fetch".to_string(),
            reason: "network unreachable".to_string(),
        })
    }
}

fn options(root: &TempDir) -> SetupOptions {
    SetupOptions {
        source: root.path().to_path_buf(),
        target: root.path().to_path_buf(),
        env_dir: PathBuf::from(DEFAULT_ENV_DIR),
        min_toolchain: MIN_TOOLCHAIN.parse().expect("min version"),
        build: true,
    }
}

#[test]
fn old_toolchain_creates_nothing() {
    let root = tempdir().expect("tempdir");
    let toolchain = FakeToolchain::new(Some("rustc 1.70.0 (90c541806 2023-05-31)"));

    let err = run_setup(&options(&root), &toolchain).unwrap_err();

    assert!(matches!(err, SetupError::ToolchainTooOld { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(!toolchain.provisioned.get());
    assert!(!root.path().join(DEFAULT_ENV_DIR).exists());
    assert!(!root.path().join("static").exists());
}

#[test]
fn missing_toolchain_fails() {
    let root = tempdir().expect("tempdir");
    let toolchain = FakeToolchain::new(None);

    let err = run_setup(&options(&root), &toolchain).unwrap_err();

    assert!(matches!(err, SetupError::ToolchainMissing));
    assert_eq!(err.exit_code(), 1);
    assert!(!root.path().join(DEFAULT_ENV_DIR).exists());
}

#[test]
fn check_toolchain_accepts_exact_minimum() {
    let toolchain = FakeToolchain::new(Some("rustc 1.85.0"));

    let version = check_toolchain(&toolchain, "1.85".parse().expect("version")).expect("accepted");
    assert_eq!(version.to_string(), "1.85.0");
}

#[test]
fn setup_creates_layout_and_copies_pages_verbatim() {
    let root = tempdir().expect("tempdir");
    let index = "<!DOCTYPE html>\n<h1>Voting</h1>\n\u{00e9}\n";
    fs::write(root.path().join("index.html"), index).expect("write index");
    fs::write(root.path().join("admin.html"), [0xde, 0xad, 0xbe, 0xef]).expect("write admin");

    let toolchain = FakeToolchain::new(Some("rustc 1.86.0"));
    let report = run_setup(&options(&root), &toolchain).expect("setup");

    assert!(toolchain.provisioned.get());
    assert!(root.path().join(DEFAULT_ENV_DIR).is_dir());
    assert!(root.path().join("static").is_dir());
    assert!(root.path().join("logs").is_dir());

    assert_eq!(report.staged, vec!["index.html", "admin.html"]);
    assert_eq!(
        fs::read(root.path().join("static/index.html")).expect("staged index"),
        index.as_bytes()
    );
    assert_eq!(
        fs::read(root.path().join("static/admin.html")).expect("staged admin"),
        [0xde, 0xad, 0xbe, 0xef]
    );
    assert!(!root.path().join("static/projector.html").exists());
}

#[test]
fn missing_pages_are_not_an_error() {
    let root = tempdir().expect("tempdir");

    let report = run_setup(&options(&root), &FakeToolchain::new(Some("1.85.0"))).expect("setup");

    assert!(report.staged.is_empty());
    assert!(!root.path().join("static/index.html").exists());
}

#[test]
fn scripts_are_generated() {
    let root = tempdir().expect("tempdir");
    let report = run_setup(&options(&root), &FakeToolchain::new(Some("1.88.0"))).expect("setup");

    let start = fs::read_to_string(&report.start_script).expect("start script");
    assert!(start.contains("HOST=0.0.0.0 PORT=8000"));
    assert!(start.contains("ENV_DIR='./build'"));
    assert!(start.contains("\"$ENV_DIR/release/ballot\""));

    let stop = fs::read_to_string(&report.stop_script).expect("stop script");
    assert!(stop.contains("pkill -f"));
    assert!(!stop.contains("rustc"));
    assert!(!stop.contains("version"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = fs::metadata(&report.start_script).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}

#[test]
fn absolute_env_dir_is_used_as_is() {
    let root = tempdir().expect("tempdir");
    let env_root = tempdir().expect("env tempdir");
    let env_dir = env_root.path().join("ballot env");

    let mut options = options(&root);
    options.env_dir = env_dir.clone();

    let toolchain = FakeToolchain::new(Some("1.85.0"));
    let report = run_setup(&options, &toolchain).expect("setup");

    assert!(env_dir.join("release").is_dir());
    let start = fs::read_to_string(&report.start_script).expect("start script");
    assert!(start.contains(&format!("ENV_DIR='{}'", env_dir.display())));
    assert!(!start.contains(".//"));
}

#[test]
fn no_build_skips_provisioning() {
    let root = tempdir().expect("tempdir");
    let mut options = options(&root);
    options.build = false;

    let toolchain = FakeToolchain::new(Some("1.85.0"));
    run_setup(&options, &toolchain).expect("setup");

    assert!(!toolchain.provisioned.get());
    assert!(!root.path().join(DEFAULT_ENV_DIR).exists());
    assert!(root.path().join("static").is_dir());
}

#[test]
fn provisioning_failure_stops_setup() {
    let root = tempdir().expect("tempdir");

    let err = run_setup(&options(&root), &FailingToolchain).unwrap_err();

    assert!(matches!(err, SetupError::Provision { .. }));
    assert!(!root.path().join("start_server.sh").exists());
}

#[test]
fn binary_exits_with_status_one_on_old_toolchain() {
    let root = tempdir().expect("tempdir");

    let status = Command::new(env!("CARGO_BIN_EXE_setup"))
        .args(["--min-toolchain", "999.0", "--no-build", "--target"])
        .arg(root.path())
        .status()
        .expect("run setup binary");

    assert_eq!(status.code(), Some(1));
    assert!(!root.path().join("static").exists());
    assert!(!root.path().join(DEFAULT_ENV_DIR).exists());
}
