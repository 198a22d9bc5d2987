//! The version control capability used to skip hashing files whose content is already known.
//!
//! The orchestrator only depends on the narrow [`VersionControl`] trait. [`GitCli`] implements
//! it by invoking the `git` binary; tests implement it with an in-memory double.

mod git;
mod tracked;

use std::{io, path::PathBuf, time::Duration};

use pkghash_digest::GitBlobHash;
use pkghash_paths::{AbsolutePath, RelativeUnixPath};
use thiserror::Error;

pub use git::GitCli;
pub use tracked::{hash_tracked_changes, TrackedChanges};

/// A file known to version control together with the hash of its committed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// The path relative to the repository root.
    pub path: RelativeUnixPath,

    /// The hash of the committed content.
    pub hash: GitBlobHash,
}

/// How a file in the working tree differs from what version control knows about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The file is not known to version control.
    Untracked,

    /// The content of the file differs from the committed content.
    Modified,

    /// The file is known to version control but no longer exists.
    Deleted,
}

/// A single line of working tree status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// The path relative to the repository root.
    pub path: RelativeUnixPath,

    /// How the file differs.
    pub kind: ChangeKind,
}

/// Errors reported by a [`VersionControl`] implementation.
#[derive(Debug, Error)]
pub enum VcsError {
    /// Version control cannot be used for this directory, e.g. because it is not a repository or
    /// because the binary is not installed.
    #[error("version control is unavailable: {0}")]
    Unavailable(String),

    /// A query did not finish in time.
    #[error("version control query timed out after {0:?}")]
    Timeout(Duration),

    /// The directory cannot be related to the root of the repository.
    #[error("{} lies outside of the repository", .0.display())]
    OutsideRepository(PathBuf),

    /// A query failed.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed {
        /// The command line that was executed.
        command: String,
        /// What the command reported on stderr.
        stderr: String,
    },

    /// An I/O error occurred while talking to version control.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The output of a query could not be parsed.
    #[error("failed to parse version control output: {0}")]
    Parse(String),
}

impl VcsError {
    /// Returns true if the error means the caller's paths cannot be related to the repository,
    /// as opposed to version control being unusable for environmental reasons.
    pub fn is_outside_repository(&self) -> bool {
        matches!(self, VcsError::OutsideRepository(_))
    }
}

/// The three queries the fingerprinting engine needs from a version control system.
///
/// All returned file paths are relative to the repository root.
pub trait VersionControl: Send + Sync {
    /// Returns the relative offset from `working_dir` to the repository root, e.g. `../../`.
    fn repo_root_offset(&self, working_dir: &AbsolutePath) -> Result<RelativeUnixPath, VcsError>;

    /// Returns the committed hash of every tracked file below `subtree`.
    fn list_tracked_hashes(
        &self,
        repo_root: &AbsolutePath,
        subtree: &RelativeUnixPath,
    ) -> Result<Vec<TrackedFile>, VcsError>;

    /// Returns every file below `subtree` that is untracked, modified or deleted.
    fn status(
        &self,
        repo_root: &AbsolutePath,
        subtree: &RelativeUnixPath,
    ) -> Result<Vec<StatusEntry>, VcsError>;
}

impl<T: VersionControl + ?Sized> VersionControl for &T {
    fn repo_root_offset(&self, working_dir: &AbsolutePath) -> Result<RelativeUnixPath, VcsError> {
        (**self).repo_root_offset(working_dir)
    }

    fn list_tracked_hashes(
        &self,
        repo_root: &AbsolutePath,
        subtree: &RelativeUnixPath,
    ) -> Result<Vec<TrackedFile>, VcsError> {
        (**self).list_tracked_hashes(repo_root, subtree)
    }

    fn status(
        &self,
        repo_root: &AbsolutePath,
        subtree: &RelativeUnixPath,
    ) -> Result<Vec<StatusEntry>, VcsError> {
        (**self).status(repo_root, subtree)
    }
}
