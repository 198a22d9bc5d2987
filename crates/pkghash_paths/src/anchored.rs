use std::{
    fmt::{self, Display, Formatter},
    path::{Component, Path, PathBuf, MAIN_SEPARATOR},
};

use crate::{validate_segments, AbsolutePath, AnchoredUnixPath, PathError};

/// A platform-native path relative to some declared root.
///
/// The path may start with `..` segments when it names something outside of the root. It is
/// never used as a map key, see [`AnchoredSystemPath::to_unix`] for the canonical rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AnchoredSystemPath(PathBuf);

impl AnchoredSystemPath {
    /// Parses a platform-native relative path.
    ///
    /// On platforms whose separator is not `/` a string containing `/` is rejected. Canonical
    /// paths must be converted with [`AnchoredUnixPath::to_system_path`] instead.
    pub fn new(path: impl AsRef<str>) -> Result<Self, PathError> {
        let path = path.as_ref();
        if MAIN_SEPARATOR != '/' && path.contains('/') {
            return Err(PathError::ForeignSeparator(path.to_string()));
        }
        Self::from_path_buf(PathBuf::from(path))
    }

    /// Wraps an already platform-native relative path.
    pub fn from_path_buf(path: PathBuf) -> Result<Self, PathError> {
        if path.has_root() || path.is_absolute() {
            return Err(PathError::NotRelative(path));
        }
        let Some(as_str) = path.to_str() else {
            return Err(PathError::NonUtf8(path));
        };
        validate_segments(as_str, std::path::is_separator)?;
        Ok(Self(path))
    }

    /// Constructs an instance without validation. Only used for conversions from other already
    /// validated flavors.
    pub(crate) fn new_unchecked(path: PathBuf) -> Self {
        Self(path)
    }

    /// Returns the underlying platform path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns true if this path refers to the anchor itself.
    pub fn is_empty(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    /// Returns true if the path leaves its anchor through a leading `..` segment.
    pub fn starts_with_parent(&self) -> bool {
        matches!(self.0.components().next(), Some(Component::ParentDir))
    }

    /// Appends another anchored path.
    pub fn join(&self, other: &AnchoredSystemPath) -> AnchoredSystemPath {
        if self.is_empty() {
            return other.clone();
        }
        Self(self.0.join(&other.0))
    }

    /// Appends a single file or directory name, e.g. one returned by a directory listing.
    pub fn join_component(&self, name: &str) -> Result<AnchoredSystemPath, PathError> {
        if name.is_empty() || name.contains(std::path::is_separator) {
            return Err(PathError::EmptySegment(name.to_string()));
        }
        if name.contains('\0') {
            return Err(PathError::NulByte(name.escape_debug().to_string()));
        }
        Ok(Self(self.0.join(name)))
    }

    /// Returns the canonical forward-slash rendering of this path.
    pub fn to_unix(&self) -> AnchoredUnixPath {
        // Validated to be UTF-8 on construction.
        let path = self.0.to_string_lossy();
        let path = if MAIN_SEPARATOR == '/' {
            path.into_owned()
        } else {
            path.replace(MAIN_SEPARATOR, "/")
        };
        AnchoredUnixPath::new_unchecked(path)
    }

    /// Resolves this path against the root it is anchored at.
    pub fn restore_anchor(&self, root: &AbsolutePath) -> AbsolutePath {
        root.join_anchored(self)
    }
}

impl AsRef<Path> for AnchoredSystemPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<&Path> for AnchoredSystemPath {
    type Error = PathError;

    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        Self::from_path_buf(value.to_path_buf())
    }
}

impl Display for AnchoredSystemPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_rejects_absolute() {
        let absolute = std::env::temp_dir();
        assert_matches!(
            AnchoredSystemPath::from_path_buf(absolute),
            Err(PathError::NotRelative(_))
        );
    }

    #[test]
    fn test_rejects_nul() {
        assert_matches!(AnchoredSystemPath::new("a\0b"), Err(PathError::NulByte(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_special_characters_are_preserved() {
        let newline = AnchoredSystemPath::new("new\nline").unwrap();
        assert_eq!(newline.to_unix().as_str(), "new\nline");

        let quote = AnchoredSystemPath::new("\"quote\"").unwrap();
        assert_eq!(quote.to_unix().as_str(), "\"quote\"");
    }

    #[cfg(unix)]
    #[test]
    fn test_parent_prefix() {
        let path = AnchoredSystemPath::new("../shared/config.json").unwrap();
        assert!(path.starts_with_parent());
        assert_eq!(path.to_unix().as_str(), "../shared/config.json");
        assert!(!AnchoredSystemPath::new("dir/file").unwrap().starts_with_parent());
    }

    #[cfg(windows)]
    #[test]
    fn test_rejects_forward_slash() {
        assert_matches!(
            AnchoredSystemPath::new("dir/file"),
            Err(PathError::ForeignSeparator(_))
        );
        let path = AnchoredSystemPath::new("dir\\file").unwrap();
        assert_eq!(path.to_unix().as_str(), "dir/file");
    }
}
