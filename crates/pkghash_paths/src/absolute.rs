use std::{
    fmt::{self, Display, Formatter},
    path::{Component, Path, PathBuf},
};

use crate::{AnchoredSystemPath, PathError, RelativeUnixPath};

/// A fully resolved, platform-native path to a location on the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsolutePath(PathBuf);

impl AbsolutePath {
    /// Constructs a new instance, failing if the path is not absolute.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PathError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(PathError::NotAbsolute(path));
        }
        Ok(Self(path))
    }

    /// Returns the current working directory of the process.
    pub fn from_cwd() -> std::io::Result<Self> {
        Ok(Self(std::env::current_dir()?))
    }

    /// Returns the underlying platform path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consumes this instance and returns the underlying path.
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Resolves an anchored path against this path.
    pub fn join_anchored(&self, path: &AnchoredSystemPath) -> AbsolutePath {
        if path.is_empty() {
            return self.clone();
        }
        Self(self.0.join(path.as_path()))
    }

    /// Resolves an offset reported by the version control system against this path. The result
    /// is normalized so that `..` segments are removed.
    pub fn join_relative_unix(&self, path: &RelativeUnixPath) -> Result<AbsolutePath, PathError> {
        Self(self.0.join(path.to_system_path())).normalize()
    }

    /// Appends a single file or directory name.
    pub fn join_component(&self, name: &str) -> AbsolutePath {
        Self(self.0.join(name))
    }

    /// Returns the parent directory, or `None` for the filesystem root.
    pub fn parent(&self) -> Option<AbsolutePath> {
        self.0.parent().map(|parent| Self(parent.to_path_buf()))
    }

    /// Lexically removes `.` and `..` segments without touching the filesystem.
    ///
    /// Fails with [`PathError::EscapesRoot`] when a `..` segment would climb above the root.
    pub fn normalize(&self) -> Result<AbsolutePath, PathError> {
        let mut normalized = PathBuf::new();
        let mut depth = 0usize;
        for component in self.0.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => normalized.push(component),
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(PathError::EscapesRoot(self.0.clone()));
                    }
                    normalized.pop();
                    depth -= 1;
                }
                Component::Normal(name) => {
                    normalized.push(name);
                    depth += 1;
                }
            }
        }
        Ok(Self(normalized))
    }

    /// Expresses `target` relative to this path. The result starts with `..` segments when
    /// `target` does not live below this path.
    pub fn anchor(&self, target: &AbsolutePath) -> Result<AnchoredSystemPath, PathError> {
        let base = self.normalize()?;
        let target = target.normalize()?;
        let relative = pathdiff::diff_paths(&target.0, &base.0)
            .filter(|relative| relative.is_relative())
            .ok_or_else(|| PathError::NotRelative(target.0.clone()))?;
        AnchoredSystemPath::from_path_buf(relative)
    }

    /// Returns true if this path is `other` or lives below it.
    pub fn starts_with(&self, other: &AbsolutePath) -> bool {
        self.0.starts_with(&other.0)
    }

    /// Returns true if this path points at a directory.
    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<PathBuf> for AbsolutePath {
    type Error = PathError;

    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&Path> for AbsolutePath {
    type Error = PathError;

    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for AbsolutePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
