#![deny(missing_docs)]
//! Typed path flavors used throughout the package fingerprinting crates.
//!
//! Four representations of a location are kept apart by the type system:
//!
//! - [`AbsolutePath`]: a fully resolved, platform-native path to a real location on disk. It is
//!   never used as a map key.
//! - [`AnchoredSystemPath`]: a platform-native path relative to some declared root. It may start
//!   with one or more `..` segments when it names a location outside of that root.
//! - [`AnchoredUnixPath`]: the canonical, forward-slash rendering of an anchored path. This is the
//!   only representation that is used as a map key or compared across platforms.
//! - [`RelativeUnixPath`]: a forward-slash path as reported by the version control system, e.g.
//!   the offset from a working directory to the repository root (`../../`).
//!
//! Converting between the flavors is always explicit. A canonical path can only become a
//! platform-native path through [`AnchoredUnixPath::to_system_path`], which makes it impossible to
//! accidentally hand a forward-slash key to the filesystem on a platform with a different
//! separator.

mod absolute;
mod anchored;
mod unix;

use std::path::PathBuf;

use thiserror::Error;

pub use absolute::AbsolutePath;
pub use anchored::AnchoredSystemPath;
pub use unix::{AnchoredUnixPath, RelativeUnixPath};

/// Errors that can occur when constructing or converting a typed path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// An absolute path was expected.
    #[error("'{}' is not an absolute path", .0.display())]
    NotAbsolute(PathBuf),

    /// A relative path was expected.
    #[error("'{}' is not a relative path", .0.display())]
    NotRelative(PathBuf),

    /// The path contains an empty segment (e.g. `a//b`).
    #[error("'{0}' contains an empty path segment")]
    EmptySegment(String),

    /// The path contains an embedded NUL byte.
    #[error("'{0}' contains a NUL byte")]
    NulByte(String),

    /// A canonical forward-slash path was used where a platform-native path was expected.
    #[error("'{0}' uses a separator that is foreign to this platform")]
    ForeignSeparator(String),

    /// The path climbs above the root of the filesystem.
    #[error("'{}' escapes the filesystem root", .0.display())]
    EscapesRoot(PathBuf),

    /// The path is not valid UTF-8 and cannot be rendered canonically.
    #[error("'{}' is not valid UTF-8", .0.display())]
    NonUtf8(PathBuf),
}

/// Checks the invariants shared by all relative string paths: no embedded NUL and no empty
/// segments between separators.
fn validate_segments(path: &str, is_separator: impl Fn(char) -> bool) -> Result<(), PathError> {
    if path.contains('\0') {
        return Err(PathError::NulByte(path.escape_debug().to_string()));
    }
    if path.is_empty() {
        return Ok(());
    }
    let trimmed = path.strip_suffix(&is_separator).unwrap_or(path);
    if trimmed.split(&is_separator).any(str::is_empty) {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    Ok(())
}
