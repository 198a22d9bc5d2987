use pkghash_paths::{AbsolutePath, AnchoredSystemPath, RelativeUnixPath};

use super::{ChangeKind, VcsError, VersionControl};
use crate::FileHashes;

/// What version control knows about the files of a package.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackedChanges {
    /// Hashes of tracked files whose content has not changed since the last commit.
    pub hashes: FileHashes,

    /// Files, relative to the package directory, that are untracked or modified and whose content
    /// has to be hashed manually.
    pub to_hash: Vec<AnchoredSystemPath>,
}

/// Asks version control for the hashes of every file of the package at `package` (relative to
/// `root`) and for the files whose hashes it cannot vouch for.
///
/// The keys of [`TrackedChanges::hashes`] and the entries of [`TrackedChanges::to_hash`] are
/// relative to the package directory. Deleted files appear in neither.
pub fn hash_tracked_changes(
    vcs: &impl VersionControl,
    root: &AbsolutePath,
    package: &AnchoredSystemPath,
) -> Result<TrackedChanges, VcsError> {
    let package_dir = package.restore_anchor(root);
    let outside = || VcsError::OutsideRepository(package_dir.as_path().to_path_buf());

    // The caller's root does not have to be the repository root, it may be any directory inside
    // the repository.
    let offset = vcs.repo_root_offset(root)?;
    let vcs_root = root.join_relative_unix(&offset).map_err(|_| outside())?;
    let package_dir = package_dir.normalize().map_err(|_| outside())?;
    if !package_dir.starts_with(&vcs_root) {
        return Err(outside());
    }

    let package_prefix = vcs_root.anchor(&package_dir).map_err(|_| outside())?.to_unix();
    let subtree = RelativeUnixPath::from(package_prefix.clone());
    tracing::debug!("querying version control at {vcs_root} for '{subtree}'");

    let tracked = vcs.list_tracked_hashes(&vcs_root, &subtree)?;
    let status = vcs.status(&vcs_root, &subtree)?;

    let mut hashes: FileHashes = tracked
        .into_iter()
        .map(|file| (file.path.anchored_at(&package_prefix), file.hash))
        .collect();

    let mut to_hash = Vec::new();
    for entry in status {
        let path = entry.path.anchored_at(&package_prefix);
        hashes.remove(&path);
        if entry.kind == ChangeKind::Deleted {
            continue;
        }

        // Modified submodules are reported by their directory.
        let path = path.to_system_path();
        if path.restore_anchor(&package_dir).is_dir() {
            tracing::trace!("skipping directory '{path}' reported by version control");
            continue;
        }
        to_hash.push(path);
    }

    tracing::debug!(
        "{} file(s) known to version control, {} file(s) to hash",
        hashes.len(),
        to_hash.len()
    );

    Ok(TrackedChanges { hashes, to_hash })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use pkghash_digest::{compute_bytes_blob_digest, GitBlobHash};
    use pkghash_paths::AnchoredUnixPath;

    use super::*;
    use crate::vcs::{StatusEntry, TrackedFile};

    /// Simulates a repository rooted at `vcs_root`.
    struct FakeVcs {
        vcs_root: AbsolutePath,
        tracked: Vec<(&'static str, &'static [u8])>,
        status: Vec<(&'static str, ChangeKind)>,
    }

    impl FakeVcs {
        fn under(&self, subtree: &RelativeUnixPath, path: &str) -> bool {
            subtree.is_empty() || path.starts_with(&format!("{subtree}/"))
        }
    }

    impl VersionControl for FakeVcs {
        fn repo_root_offset(
            &self,
            working_dir: &AbsolutePath,
        ) -> Result<RelativeUnixPath, VcsError> {
            if !working_dir.starts_with(&self.vcs_root) {
                return Err(VcsError::Unavailable("not a git repository".into()));
            }
            let depth = self
                .vcs_root
                .anchor(working_dir)
                .map_err(|err| VcsError::Parse(err.to_string()))?
                .as_path()
                .components()
                .count();
            Ok(RelativeUnixPath::new("../".repeat(depth)).unwrap())
        }

        fn list_tracked_hashes(
            &self,
            repo_root: &AbsolutePath,
            subtree: &RelativeUnixPath,
        ) -> Result<Vec<TrackedFile>, VcsError> {
            assert_eq!(repo_root, &self.vcs_root);
            Ok(self
                .tracked
                .iter()
                .filter(|(path, _)| self.under(subtree, path))
                .map(|(path, content)| TrackedFile {
                    path: RelativeUnixPath::new(*path).unwrap(),
                    hash: compute_bytes_blob_digest(content),
                })
                .collect())
        }

        fn status(
            &self,
            repo_root: &AbsolutePath,
            subtree: &RelativeUnixPath,
        ) -> Result<Vec<StatusEntry>, VcsError> {
            assert_eq!(repo_root, &self.vcs_root);
            Ok(self
                .status
                .iter()
                .filter(|(path, _)| self.under(subtree, path))
                .map(|(path, kind)| StatusEntry {
                    path: RelativeUnixPath::new(*path).unwrap(),
                    kind: *kind,
                })
                .collect())
        }
    }

    fn repo_root() -> AbsolutePath {
        AbsolutePath::new(std::env::temp_dir().join("pkghash-fake-repo")).unwrap()
    }

    fn fake() -> FakeVcs {
        FakeVcs {
            vcs_root: repo_root(),
            tracked: vec![
                ("my-pkg/committed-file", b"committed bytes"),
                ("my-pkg/deleted-file", b"delete-me"),
                ("my-pkg/modified-file", b"old bytes"),
                ("my-pkg/dir/nested-file", b"nested"),
                ("other-pkg/file", b"anything"),
            ],
            status: vec![
                ("my-pkg/deleted-file", ChangeKind::Deleted),
                ("my-pkg/modified-file", ChangeKind::Modified),
                ("my-pkg/uncommitted-file", ChangeKind::Untracked),
            ],
        }
    }

    fn keys(hashes: &FileHashes) -> Vec<&str> {
        hashes.keys().map(AnchoredUnixPath::as_str).collect()
    }

    #[test]
    fn test_unchanged_tracked_files_keep_their_hash() {
        let changes = hash_tracked_changes(
            &fake(),
            &repo_root(),
            &AnchoredSystemPath::new("my-pkg").unwrap(),
        )
        .unwrap();

        assert_eq!(keys(&changes.hashes), vec!["committed-file", "dir/nested-file"]);
        let expected: BTreeMap<&str, GitBlobHash> = BTreeMap::from([
            ("committed-file", compute_bytes_blob_digest(b"committed bytes")),
            ("dir/nested-file", compute_bytes_blob_digest(b"nested")),
        ]);
        for (path, hash) in &changes.hashes {
            assert_eq!(&expected[path.as_str()], hash);
        }

        let to_hash = changes
            .to_hash
            .iter()
            .map(|path| path.to_unix().to_string())
            .collect::<Vec<_>>();
        assert_eq!(to_hash, vec!["modified-file", "uncommitted-file"]);
    }

    #[test]
    fn test_root_below_repository_root() {
        let vcs = fake();
        let root = repo_root().join_component("my-pkg");
        let changes = hash_tracked_changes(&vcs, &root, &AnchoredSystemPath::default()).unwrap();
        assert_eq!(keys(&changes.hashes), vec!["committed-file", "dir/nested-file"]);
    }

    #[test]
    fn test_whole_repository() {
        let changes =
            hash_tracked_changes(&fake(), &repo_root(), &AnchoredSystemPath::default()).unwrap();
        assert_eq!(
            keys(&changes.hashes),
            vec!["my-pkg/committed-file", "my-pkg/dir/nested-file", "other-pkg/file"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_package_outside_repository() {
        assert_matches!(
            hash_tracked_changes(
                &fake(),
                &repo_root(),
                &AnchoredSystemPath::new("../elsewhere").unwrap()
            ),
            Err(VcsError::OutsideRepository(_))
        );
    }

    #[test]
    fn test_directories_are_not_hashed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let vcs_root = AbsolutePath::new(temp_dir.path()).unwrap();
        fs_err::create_dir_all(temp_dir.path().join("my-pkg").join("submodule")).unwrap();

        let vcs = FakeVcs {
            vcs_root: vcs_root.clone(),
            tracked: vec![("my-pkg/committed-file", b"committed bytes")],
            status: vec![
                ("my-pkg/submodule", ChangeKind::Modified),
                ("my-pkg/uncommitted-file", ChangeKind::Untracked),
            ],
        };
        let changes =
            hash_tracked_changes(&vcs, &vcs_root, &AnchoredSystemPath::new("my-pkg").unwrap())
                .unwrap();

        assert_eq!(keys(&changes.hashes), vec!["committed-file"]);
        let to_hash = changes
            .to_hash
            .iter()
            .map(|path| path.to_unix().to_string())
            .collect::<Vec<_>>();
        assert_eq!(to_hash, vec!["uncommitted-file"]);
    }

    #[test]
    fn test_unavailable_is_propagated() {
        let root = AbsolutePath::new(std::env::temp_dir().join("not-a-repo")).unwrap();
        assert_matches!(
            hash_tracked_changes(&fake(), &root, &AnchoredSystemPath::default()),
            Err(VcsError::Unavailable(_))
        );
    }
}
