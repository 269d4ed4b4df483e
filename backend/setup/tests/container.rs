use std::{
    fs,
    path::{Path, PathBuf},
};

use setup::models::{ASSETS, BIN_NAME};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("workspace root")
        .to_path_buf()
}

fn dockerfile() -> String {
    fs::read_to_string(workspace_root().join("Dockerfile")).expect("read Dockerfile")
}

fn copy_sources(line: &str) -> Option<Vec<&str>> {
    let rest = line.trim().strip_prefix("COPY ")?;
    if rest.contains("--from=") {
        return None;
    }

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    (tokens.len() >= 2).then(|| tokens[..tokens.len() - 1].to_vec())
}

#[test]
fn copy_sources_exist() {
    let root = workspace_root();

    let missing: Vec<String> = dockerfile()
        .lines()
        .filter_map(copy_sources)
        .flatten()
        .filter(|src| !root.join(src).exists())
        .map(ToString::to_string)
        .collect();

    assert!(missing.is_empty(), "missing COPY sources: {missing:?}");
}

#[test]
fn stages_every_page() {
    let content = dockerfile();
    let staged: Vec<&str> = content
        .lines()
        .filter(|line| line.contains("./static/"))
        .filter_map(copy_sources)
        .flatten()
        .collect();

    for asset in ASSETS {
        assert!(staged.contains(&asset), "{asset} is not staged into the image");
    }
}

#[test]
fn runtime_listens_on_8000() {
    let content = dockerfile();

    assert_eq!(content.matches("FROM ").count(), 2, "expected a builder and a runtime stage");
    assert!(content.contains("EXPOSE 8000"));
    assert!(content.contains("HOST=0.0.0.0"));
    assert!(content.contains("PORT=8000"));
    assert!(content.contains("RUST_LOG=info"));
    assert!(content.contains("mkdir -p logs"));
    assert!(content.contains(&format!("--bin {BIN_NAME}")));
}
