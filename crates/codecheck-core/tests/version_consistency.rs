//! The three codecheck crates ship together: every workspace member takes
//! its version from `[workspace.package]`, and the path dependencies the
//! CLI and LLM backend use to reach each other pin that same version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .unwrap()
        .to_path_buf()
}

fn read_toml(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    text.parse()
        .unwrap_or_else(|e| panic!("cannot parse {}: {e}", path.display()))
}

fn root_manifest() -> toml::Value {
    read_toml(&workspace_root().join("Cargo.toml"))
}

fn workspace_version() -> String {
    root_manifest()["workspace"]["package"]["version"]
        .as_str()
        .unwrap()
        .to_string()
}

fn members() -> Vec<String> {
    root_manifest()["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn members_inherit_the_workspace_version() {
    let members = members();
    assert_eq!(members.len(), 3, "unexpected members: {members:?}");

    for member in &members {
        let manifest = read_toml(&workspace_root().join(member).join("Cargo.toml"));
        let inherits = manifest["package"]["version"]
            .get("workspace")
            .and_then(toml::Value::as_bool);
        assert_eq!(
            inherits,
            Some(true),
            "{member} must use version.workspace = true"
        );
    }
}

#[test]
fn internal_dependencies_pin_the_workspace_version() {
    let version = workspace_version();
    let root = root_manifest();
    let deps = root["workspace"]["dependencies"].as_table().unwrap();

    for name in ["codecheck-core", "codecheck-llm"] {
        let dep = &deps[name];
        assert_eq!(
            dep["version"].as_str(),
            Some(version.as_str()),
            "{name} is pinned to a different version than the workspace"
        );
        let path = dep["path"].as_str().unwrap();
        assert!(
            members().iter().any(|m| m == path),
            "{name} points at {path}, which is not a workspace member"
        );
    }
}

#[test]
fn compiled_version_matches_the_manifest() {
    assert_eq!(workspace_version(), env!("CARGO_PKG_VERSION"));
}
