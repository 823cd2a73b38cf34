//! Ensures all workspace crates use `version.workspace = true` and that
//! the workspace version matches what the crates are built with.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .unwrap()
        .to_path_buf()
}

fn read_manifest(path: &Path) -> toml::Value {
    let raw = std::fs::read_to_string(path).unwrap();
    raw.parse().unwrap()
}

#[test]
fn all_members_use_workspace_version() {
    let root = workspace_root();
    let doc = read_manifest(&root.join("Cargo.toml"));
    let members = doc["workspace"]["members"].as_array().unwrap();
    assert!(!members.is_empty());

    for member in members {
        let member = member.as_str().unwrap();
        let manifest = read_manifest(&root.join(member).join("Cargo.toml"));
        let inherits = manifest["package"]["version"]
            .as_table()
            .and_then(|t| t.get("workspace"))
            .and_then(|v| v.as_bool());
        assert_eq!(
            inherits,
            Some(true),
            "{member} should use version.workspace = true"
        );
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let doc = read_manifest(&workspace_root().join("Cargo.toml"));
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(ws_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(ws_version, rollout_core::VERSION);
}

#[test]
fn internal_dependency_versions_track_workspace() {
    let doc = read_manifest(&workspace_root().join("Cargo.toml"));
    let deps = doc["workspace"]["dependencies"].as_table().unwrap();
    for name in ["rollout-core", "rollout-devops"] {
        let version = deps[name]["version"].as_str().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"), "{name}");
    }
}
