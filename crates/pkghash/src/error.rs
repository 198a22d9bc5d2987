use std::{io, path::PathBuf};

use pkghash_glob::GlobSetError;
use pkghash_paths::{AnchoredUnixPath, PathError};
use thiserror::Error;

use crate::OptionsError;

/// Errors that abort a hashing request. No mapping is ever returned alongside an error.
#[derive(Debug, Error)]
pub enum HashingError {
    /// A requested file does not exist.
    #[error("the file '{0}' does not exist")]
    FileNotFound(AnchoredUnixPath),

    /// The root or package directory cannot be related to the root of the repository.
    #[error("the package '{package}' in {} lies outside of the repository", root.display())]
    PathOutsideRepository {
        /// The root the caller passed in.
        root: PathBuf,
        /// The package directory relative to `root`.
        package: String,
    },

    /// Reading a file or listing a directory failed.
    #[error("failed to access {}", .0.display())]
    Io(PathBuf, #[source] io::Error),

    /// Walking a directory tree failed.
    #[error("failed to walk {}", .0.display())]
    Walk(PathBuf, #[source] ignore::Error),

    /// One of the input patterns is malformed.
    #[error("invalid input pattern")]
    InvalidPattern(#[from] GlobSetError),

    /// A path could not be represented.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// An ignore file could not be parsed.
    #[error("failed to parse ignore file {}", .0.display())]
    IgnoreFile(PathBuf, #[source] ignore::Error),

    /// The options are out of range.
    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),

    /// The dedicated hashing thread pool could not be created.
    #[error("failed to create the hashing thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
