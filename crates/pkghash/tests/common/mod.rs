//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::{collections::BTreeMap, path::Path, process::Command};

use pkghash::FileHashes;
use pkghash_paths::{AnchoredSystemPath, AnchoredUnixPath};

pub const EMPTY_BLOB: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

/// Returns false, and says so, when there is no `git` binary to test against.
pub fn git_available() -> bool {
    if which::which("git").is_err() {
        eprintln!("git is not installed, skipping");
        return false;
    }
    true
}

/// Runs git in `dir` with a fixed identity and panics when it fails.
pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
            "-c",
            "core.autocrlf=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Initializes a repository in `dir` and commits everything in it.
pub fn commit_all(dir: &Path) {
    git(dir, &["init", "."]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "foo"]);
}

/// Writes `contents` to `path` below `root`, creating parent directories as needed.
pub fn write_file(root: &Path, path: &str, contents: &str) {
    let path = root.join(AnchoredUnixPath::new(path).unwrap().to_system_path());
    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, contents).unwrap();
}

/// Converts canonical paths to platform-native anchored paths.
pub fn anchored(paths: &[&str]) -> Vec<AnchoredSystemPath> {
    paths
        .iter()
        .map(|path| AnchoredUnixPath::new(*path).unwrap().to_system_path())
        .collect()
}

/// Renders hashes as strings so they compare nicely against literals.
pub fn to_hex(hashes: &FileHashes) -> BTreeMap<String, String> {
    hashes
        .iter()
        .map(|(path, hash)| (path.to_string(), format!("{hash:x}")))
        .collect()
}

/// Builds the expected mapping from literals.
pub fn expected(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(path, hash)| (path.to_string(), hash.to_string()))
        .collect()
}
