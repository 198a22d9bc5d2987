use std::{
    borrow::Borrow,
    fmt::{self, Display, Formatter},
    path::{PathBuf, MAIN_SEPARATOR},
};

use typed_path::{Utf8UnixComponent, Utf8UnixPath};

use crate::{validate_segments, AnchoredSystemPath, PathError};

/// The canonical, forward-slash rendering of an anchored path.
///
/// This is the only path flavor that is used as a map key. Its ordering is the byte-wise ordering
/// of the underlying string which makes it stable across platforms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AnchoredUnixPath(String);

impl AnchoredUnixPath {
    /// Parses a canonical path.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        validate_segments(&path, |c| c == '/')?;
        if Utf8UnixPath::new(&path).is_absolute() {
            return Err(PathError::NotRelative(PathBuf::from(path)));
        }
        Ok(Self(path))
    }

    pub(crate) fn new_unchecked(path: String) -> Self {
        Self(path)
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this path refers to the anchor itself.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the path leaves its anchor through a leading `..` segment.
    pub fn starts_with_parent(&self) -> bool {
        matches!(
            Utf8UnixPath::new(&self.0).components().next(),
            Some(Utf8UnixComponent::ParentDir)
        )
    }

    /// Appends another canonical path.
    pub fn join(&self, other: &AnchoredUnixPath) -> AnchoredUnixPath {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Self(format!("{}/{}", self.0.trim_end_matches('/'), other.0))
    }

    /// Re-expresses this path relative to `base`. Both paths must be anchored at the same root.
    /// The result starts with `..` segments when this path does not live below `base`.
    pub fn relative_to(&self, base: &AnchoredUnixPath) -> AnchoredUnixPath {
        let ours = normal_components(&self.0);
        let theirs = normal_components(&base.0);
        let common = ours
            .iter()
            .zip(theirs.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let segments = std::iter::repeat("..")
            .take(theirs.len() - common)
            .chain(ours[common..].iter().copied())
            .collect::<Vec<_>>();
        Self(segments.join("/"))
    }

    /// Converts the canonical rendering to a platform-native path.
    pub fn to_system_path(&self) -> AnchoredSystemPath {
        let path = if MAIN_SEPARATOR == '/' {
            self.0.clone()
        } else {
            self.0.replace('/', &MAIN_SEPARATOR.to_string())
        };
        AnchoredSystemPath::new_unchecked(PathBuf::from(path))
    }
}

/// Returns the components of a forward-slash path with `.` segments removed and `..` segments
/// resolved where possible.
fn normal_components(path: &str) -> Vec<&str> {
    let mut components = Vec::new();
    for component in Utf8UnixPath::new(path).components() {
        match component {
            Utf8UnixComponent::Normal(name) => components.push(name),
            Utf8UnixComponent::ParentDir => match components.last() {
                Some(&last) if last != ".." => {
                    components.pop();
                }
                _ => components.push(".."),
            },
            Utf8UnixComponent::CurDir | Utf8UnixComponent::RootDir => {}
        }
    }
    components
}

impl Borrow<str> for AnchoredUnixPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AnchoredUnixPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for AnchoredUnixPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for AnchoredUnixPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A forward-slash relative path as reported by the version control system.
///
/// Unlike [`AnchoredUnixPath`] this type does not carry a particular anchor. It is used for
/// repository-relative file names and for the offset between a working directory and the
/// repository root (e.g. `../../`), which may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RelativeUnixPath(String);

impl RelativeUnixPath {
    /// Parses a forward-slash relative path.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        validate_segments(&path, |c| c == '/')?;
        if Utf8UnixPath::new(&path).is_absolute() {
            return Err(PathError::NotRelative(PathBuf::from(path)));
        }
        Ok(Self(path))
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the path to its platform-native form.
    pub fn to_system_path(&self) -> PathBuf {
        Utf8UnixPath::new(&self.0)
            .components()
            .filter_map(|component| match component {
                Utf8UnixComponent::Normal(name) => Some(name),
                Utf8UnixComponent::ParentDir => Some(".."),
                Utf8UnixComponent::CurDir | Utf8UnixComponent::RootDir => None,
            })
            .collect()
    }

    /// Treats this path as anchored at the same root as `base` and re-expresses it relative to
    /// `base`.
    pub fn anchored_at(&self, base: &AnchoredUnixPath) -> AnchoredUnixPath {
        AnchoredUnixPath::new_unchecked(self.0.clone()).relative_to(base)
    }
}

impl From<AnchoredUnixPath> for RelativeUnixPath {
    fn from(value: AnchoredUnixPath) -> Self {
        Self(value.0)
    }
}

impl Display for RelativeUnixPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
