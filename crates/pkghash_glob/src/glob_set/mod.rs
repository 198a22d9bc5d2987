//! Convenience wrapper around `ignore` that resolves ordered include/exclude patterns.
//!
//! This module provides [`GlobSet`], which evaluates patterns left to right: inclusions add the
//! files they match, exclusions (leading `!`) remove matching files that were added before them.
//!
//! # Pattern Rebasing
//!
//! Patterns containing leading `..` components (e.g., `../src/*.rs`) are automatically rebased
//! to work from a common ancestor directory. This allows patterns to reference files outside the
//! immediate search root while still using a single efficient directory walker.
//!
//! For example, searching from `/project/subdir` with patterns `["../src/*.rs", "*.txt"]`:
//! - The walker starts from `/project` (the **effective walk root**)
//! - `../src/*.rs` becomes `/src/*.rs`
//! - `*.txt` becomes `/subdir/*.txt`
//!
//! See the `walk_root` module for implementation details.

mod walk;
mod walk_root;

use std::path::{Path, PathBuf};

use thiserror::Error;

use walk_root::WalkRoot;
pub use walk_root::WalkRootsError;

/// An ordered set of include/exclude globs implemented using the `ignore` crate (globset + fast
/// walker).
#[derive(Debug, Clone)]
pub struct GlobSet {
    walk_roots: WalkRoot,
}

/// Errors that can occur when creating or walking a glob set.
#[derive(Error, Debug)]
pub enum GlobSetError {
    /// Failed to build the glob override patterns.
    #[error("failed to build globs")]
    BuildOverrides(#[source] ignore::Error),

    /// An error occurred while walking the directory tree.
    #[error("walk error at {}", .0.display())]
    Walk(PathBuf, #[source] ignore::Error),

    /// An error occurred while building the walk roots from glob patterns.
    #[error(transparent)]
    WalkRoots(#[from] WalkRootsError),
}

impl GlobSet {
    /// Create a new [`GlobSet`] from a list of patterns. Leading '!' indicates exclusion.
    ///
    /// # Errors
    /// Returns a [`GlobSetError`] if the glob patterns are invalid.
    pub fn create<'t>(globs: impl IntoIterator<Item = &'t str>) -> Result<GlobSet, GlobSetError> {
        Ok(GlobSet {
            walk_roots: WalkRoot::build(globs)?,
        })
    }

    /// Returns the absolute paths of all files below (or, through `..` patterns, next to)
    /// `root_dir` that are selected by the patterns. The result is sorted.
    pub fn collect_matching(&self, root_dir: &Path) -> Result<Vec<PathBuf>, GlobSetError> {
        if self.walk_roots.is_empty() || self.walk_roots.has_no_inclusions() {
            return Ok(vec![]);
        }

        let rebased = self.walk_roots.rebase(root_dir)?;
        walk::walk_globs(&rebased.root, &rebased.globs)
    }
}
