#![deny(missing_docs)]
//! Deterministic content fingerprints for the files of a build-system package.
//!
//! The fingerprint of a package is a mapping from the canonical, forward-slash path of every
//! input file (relative to the package directory) to the git blob hash of its content. A higher
//! level cache-key builder can sort these pairs and concatenate them to obtain a stable key.
//!
//! Two strategies produce the same digests:
//!
//! - **Version control**: the hashes of tracked, unchanged files are read from git. Only
//!   untracked and modified files are read from disk.
//! - **Manual**: files are read and hashed with the same blob framing git uses. This is used
//!   for explicit file lists, for files selected by input patterns, and as a fallback when
//!   version control is unavailable (in which case ignore files are honoured).
//!
//! # Examples
//!
//! ```no_run
//! use pkghash::get_package_file_hashes;
//! use pkghash_paths::{AbsolutePath, AnchoredSystemPath};
//!
//! let root = AbsolutePath::from_cwd().unwrap();
//! let package = AnchoredSystemPath::new("packages").unwrap().join_component("ui").unwrap();
//!
//! // Every file of the package that is not ignored.
//! let all = get_package_file_hashes(&root, &package, &[] as &[&str]).unwrap();
//!
//! // Only the sources, the package manifest is always included.
//! let sources = get_package_file_hashes(&root, &package, &["src/**", "!src/**/*.test.ts"]).unwrap();
//! println!("{} of {} files are sources", sources.len(), all.len());
//! ```

mod error;
mod hasher;
mod ignore_rules;
mod manual;
mod options;
pub mod vcs;

use std::collections::BTreeMap;

use pkghash_digest::GitBlobHash;
use pkghash_paths::{AbsolutePath, AnchoredSystemPath, AnchoredUnixPath};

pub use error::HashingError;
pub use hasher::PackageHasher;
pub use ignore_rules::{IgnoreMatcher, IgnoreRule};
pub use options::{HashingOptions, OptionsError};

use vcs::GitCli;

/// A mapping from the canonical path of a file to the blob hash of its content. Iterating the
/// mapping yields the paths in a stable, platform independent order.
pub type FileHashes = BTreeMap<AnchoredUnixPath, GitBlobHash>;

/// Hashes every file in `files`, resolved against `root`.
///
/// Fails with [`HashingError::FileNotFound`] if any of the files does not exist. No partial
/// result is ever returned.
pub fn get_hashes_for_files(
    root: &AbsolutePath,
    files: &[AnchoredSystemPath],
) -> Result<FileHashes, HashingError> {
    PackageHasher::<GitCli>::default().get_hashes_for_files(root, files)
}

/// Hashes the files in `files` that exist, resolved against `root`. Files that do not exist are
/// left out of the result.
pub fn get_hashes_for_existing_files(
    root: &AbsolutePath,
    files: &[AnchoredSystemPath],
) -> Result<FileHashes, HashingError> {
    PackageHasher::<GitCli>::default().get_hashes_for_existing_files(root, files)
}

/// Computes the fingerprint of the package at `package` (relative to `root`) with the default
/// [`HashingOptions`]. See [`PackageHasher::get_package_file_hashes`].
pub fn get_package_file_hashes<S: AsRef<str>>(
    root: &AbsolutePath,
    package: &AnchoredSystemPath,
    input_patterns: &[S],
) -> Result<FileHashes, HashingError> {
    PackageHasher::<GitCli>::default().get_package_file_hashes(root, package, input_patterns)
}
