//! Determines the directory a glob walk starts from.
//!
//! Patterns may reach outside of the search root through leading `..` components. Instead of
//! walking once per distinct base directory, all patterns are rebased onto the deepest ancestor
//! of the search root that covers every pattern (the **effective walk root**). Each pattern is
//! then prefixed with the path from the effective walk root back down to the location it was
//! written relative to, and anchored with a leading `/`.
//!
//! For example, given the search root `/project/subdir` and the patterns `["../src/*.rs",
//! "*.txt"]` the effective walk root is `/project` and the rebased patterns are `/src/*.rs` and
//! `/subdir/*.txt`.

use std::path::{Component, Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;

/// A single parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SimpleGlob {
    /// The pattern without leading `!`, `./` or `../` components.
    glob: String,

    /// Whether the pattern removes files instead of selecting them.
    negated: bool,

    /// The number of leading `..` components.
    parent_dirs: usize,
}

/// The ordered list of parsed patterns.
#[derive(Debug, Clone, Default)]
pub(crate) struct WalkRoot {
    globs: Vec<SimpleGlob>,
}

/// The patterns rewritten relative to the effective walk root.
#[derive(Debug, Clone)]
pub(crate) struct RebasedGlobs {
    /// The directory to start walking from.
    pub root: PathBuf,

    /// Gitignore style override lines, in the same order as the original patterns. Exclusions
    /// keep their leading `!`.
    pub globs: Vec<String>,
}

/// Errors that can occur when determining the effective walk root.
#[derive(Debug, Error)]
pub enum WalkRootsError {
    /// A pattern was empty.
    #[error("empty glob pattern")]
    EmptyPattern,

    /// A pattern uses `..` inside the pattern instead of as a leading component.
    #[error("the glob '{0}' contains a '..' component that is not at the start of the pattern")]
    InteriorParentDir(String),

    /// Following the leading `..` components of a pattern leaves the filesystem.
    #[error("the glob '{glob}' escapes the filesystem root when resolved from {}", root.display())]
    EscapesRoot {
        /// The offending pattern.
        glob: String,
        /// The directory the pattern was resolved from.
        root: PathBuf,
    },

    /// The directory the walk would start from does not exist.
    #[error("the directory {} does not exist", .0.display())]
    MissingRoot(PathBuf),
}

impl WalkRoot {
    /// Parses the patterns. A leading `!` marks an exclusion.
    pub fn build<'t>(globs: impl IntoIterator<Item = &'t str>) -> Result<Self, WalkRootsError> {
        let globs = globs
            .into_iter()
            .map(SimpleGlob::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { globs })
    }

    /// Returns true if there are no patterns.
    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    /// Returns true if no pattern selects any file.
    pub fn has_no_inclusions(&self) -> bool {
        self.globs.iter().all(|glob| glob.negated)
    }

    /// Determines the effective walk root for `root` and rewrites all patterns relative to it.
    pub fn rebase(&self, root: &Path) -> Result<RebasedGlobs, WalkRootsError> {
        let root = normalize(root);
        let max_parent_dirs = self
            .globs
            .iter()
            .map(|glob| glob.parent_dirs)
            .max()
            .unwrap_or(0);

        // Walk up from the search root, remembering the names of the directories we leave behind
        // so they can be prepended to the patterns again.
        let mut effective_root = root.clone();
        let mut stripped = Vec::with_capacity(max_parent_dirs);
        for _ in 0..max_parent_dirs {
            let name = effective_root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            match (name, effective_root.parent()) {
                (Some(name), Some(parent)) => {
                    stripped.push(name);
                    effective_root = parent.to_path_buf();
                }
                _ => {
                    let glob = self
                        .globs
                        .iter()
                        .find(|glob| glob.parent_dirs == max_parent_dirs)
                        .map(SimpleGlob::to_string)
                        .unwrap_or_default();
                    return Err(WalkRootsError::EscapesRoot { glob, root });
                }
            }
        }
        stripped.reverse();

        if !effective_root.is_dir() {
            return Err(WalkRootsError::MissingRoot(effective_root));
        }

        let globs = self
            .globs
            .iter()
            .flat_map(|glob| {
                let prefix = &stripped[..max_parent_dirs - glob.parent_dirs];
                glob.rebased_lines(prefix)
            })
            .collect();

        tracing::trace!(
            "rebased {} glob(s) onto {}",
            self.globs.len(),
            effective_root.display()
        );

        Ok(RebasedGlobs {
            root: effective_root,
            globs,
        })
    }
}

impl SimpleGlob {
    fn parse(pattern: &str) -> Result<Self, WalkRootsError> {
        let (negated, pattern) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };

        #[cfg(windows)]
        let pattern = pattern.replace('\\', "/");
        #[cfg(windows)]
        let pattern = pattern.as_str();

        if pattern.is_empty() {
            return Err(WalkRootsError::EmptyPattern);
        }

        let mut rest = pattern.trim_start_matches('/');
        let mut parent_dirs = 0;
        loop {
            if let Some(stripped) = rest.strip_prefix("./") {
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("../") {
                parent_dirs += 1;
                rest = stripped;
            } else if rest == ".." {
                parent_dirs += 1;
                rest = "";
            } else if rest == "." {
                rest = "";
            } else {
                break;
            }
            rest = rest.trim_start_matches('/');
        }

        let glob = rest.trim_end_matches('/');
        if glob.split('/').any(|segment| segment == "..") {
            return Err(WalkRootsError::InteriorParentDir(pattern.to_string()));
        }

        Ok(Self {
            glob: glob.to_string(),
            negated,
            parent_dirs,
        })
    }

    /// Produces the anchored override lines for this pattern. Every pattern contributes itself
    /// and a `/**` variant so that naming a directory selects its contents.
    fn rebased_lines(&self, prefix: &[String]) -> Vec<String> {
        let path = prefix
            .iter()
            .map(|segment| escape_literal(segment))
            .chain((!self.glob.is_empty()).then(|| self.glob.clone()))
            .join("/");
        let bang = if self.negated { "!" } else { "" };

        if path.is_empty() {
            vec![format!("{bang}/**")]
        } else if path.ends_with("/**") || path == "**" {
            vec![format!("{bang}/{path}")]
        } else {
            vec![format!("{bang}/{path}"), format!("{bang}/{path}/**")]
        }
    }
}

impl std::fmt::Display for SimpleGlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        for _ in 0..self.parent_dirs {
            f.write_str("../")?;
        }
        f.write_str(&self.glob)
    }
}

/// Escapes glob meta characters in a literal directory name.
fn escape_literal(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '*' | '?' | '[' | ']' | '{' | '}' | '\\' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("*.txt", false, 0, "*.txt")]
    #[case("!some-dir/excluded-file", true, 0, "some-dir/excluded-file")]
    #[case("../**/*-file", false, 1, "**/*-file")]
    #[case("./../../shared/", false, 2, "shared")]
    #[case("..", false, 1, "")]
    fn test_parse(
        #[case] input: &str,
        #[case] negated: bool,
        #[case] parent_dirs: usize,
        #[case] glob: &str,
    ) {
        let parsed = SimpleGlob::parse(input).unwrap();
        assert_eq!(parsed.negated, negated);
        assert_eq!(parsed.parent_dirs, parent_dirs);
        assert_eq!(parsed.glob, glob);
    }

    #[test]
    fn test_parse_errors() {
        assert_matches!(SimpleGlob::parse(""), Err(WalkRootsError::EmptyPattern));
        assert_matches!(SimpleGlob::parse("!"), Err(WalkRootsError::EmptyPattern));
        assert_matches!(
            SimpleGlob::parse("src/../lib"),
            Err(WalkRootsError::InteriorParentDir(_))
        );
    }

    #[test]
    fn test_rebase() {
        let temp_dir = tempfile::tempdir().unwrap();
        let search_root = temp_dir.path().join("subdir");
        std::fs::create_dir(&search_root).unwrap();

        let walk_root = WalkRoot::build(["../src/*.rs", "*.txt", "!../**/skip.txt"]).unwrap();
        let rebased = walk_root.rebase(&search_root).unwrap();

        assert_eq!(rebased.root, normalize(temp_dir.path()));
        assert_eq!(
            rebased.globs,
            vec![
                "/src/*.rs",
                "/src/*.rs/**",
                "/subdir/*.txt",
                "/subdir/*.txt/**",
                "!/**/skip.txt",
                "!/**/skip.txt/**",
            ]
        );
    }

    #[test]
    fn test_rebase_escapes_root() {
        let walk_root = WalkRoot::build(["../../../../../../../../../../../../../../../*"]).unwrap();
        let root = std::env::temp_dir();
        let depth = normalize(&root).components().count();
        if depth < 15 {
            assert_matches!(
                walk_root.rebase(&root),
                Err(WalkRootsError::EscapesRoot { .. })
            );
        }
    }

    #[test]
    fn test_rebase_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let walk_root = WalkRoot::build(["*.txt"]).unwrap();
        assert_matches!(
            walk_root.rebase(&temp_dir.path().join("missing")),
            Err(WalkRootsError::MissingRoot(_))
        );
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("plain"), "plain");
        assert_eq!(escape_literal("[weird]{dir}*"), "[[]weird[]][{]dir[}][*]");
    }
}
