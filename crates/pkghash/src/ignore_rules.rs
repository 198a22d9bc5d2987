//! Layered ignore-file matching.
//!
//! An [`IgnoreMatcher`] holds one layer of rules per directory on the path from the version
//! control root down to the package directory (and, while walking, further down into the
//! package). Each ignore file is read and parsed exactly once per request; layers are shared
//! between the matchers of sibling directories.
//!
//! A candidate path is matched against the deepest layer first. The first layer that has an
//! opinion about the path decides, and within a layer the last matching line wins. This means a
//! deeper negation (`!pattern`) re-includes a path excluded by a shallower rule. Directories that
//! are excluded are pruned by the walk, so their contents are never examined again.

use std::{path::Path, sync::Arc};

use ignore::{
    gitignore::{Gitignore, GitignoreBuilder},
    Match,
};
use pkghash_paths::AbsolutePath;

use crate::HashingError;

/// A single line of an ignore file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    /// The pattern without a leading `!`.
    pub pattern: String,

    /// Whether the rule re-includes paths instead of excluding them.
    pub negated: bool,

    /// Whether the rule only applies to directories (trailing `/`).
    pub directory_only: bool,

    /// The number of directories between the version control root and the directory containing
    /// the ignore file.
    pub anchor_depth: usize,
}

impl IgnoreRule {
    /// Parses a line of an ignore file. Returns `None` for blank lines and comments.
    fn parse(line: &str, anchor_depth: usize) -> Option<Self> {
        let line = line.trim_end_matches([' ', '\t', '\r']);
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        if pattern.is_empty() {
            return None;
        }
        Some(Self {
            pattern: pattern.to_string(),
            negated,
            directory_only: pattern.ends_with('/'),
            anchor_depth,
        })
    }
}

#[derive(Debug)]
struct IgnoreLayer {
    dir: AbsolutePath,
    rules: Vec<IgnoreRule>,
    gitignore: Gitignore,
}

/// A request-scoped, layered set of ignore rules.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: AbsolutePath,
    ignore_file_name: String,
    layers: Vec<Arc<IgnoreLayer>>,
    depth: usize,
}

impl IgnoreMatcher {
    /// Reads the ignore files of every directory from `vcs_root` down to and including
    /// `package_dir`.
    ///
    /// If `package_dir` does not live below `vcs_root` only the ignore file of `package_dir`
    /// itself is considered. The `.git/info/exclude` file of `vcs_root` is read as the
    /// shallowest layer when it exists.
    pub fn build(
        vcs_root: &AbsolutePath,
        package_dir: &AbsolutePath,
        ignore_file_name: &str,
    ) -> Result<Self, HashingError> {
        let vcs_root = vcs_root.normalize()?;
        let package_dir = package_dir.normalize()?;

        let mut dirs = Vec::new();
        if package_dir.starts_with(&vcs_root) {
            let mut current = package_dir.clone();
            while current != vcs_root {
                dirs.push(current.clone());
                match current.parent() {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            dirs.push(vcs_root.clone());
            dirs.reverse();
        } else {
            dirs.push(package_dir.clone());
        }

        let mut matcher = Self {
            root: vcs_root.clone(),
            ignore_file_name: ignore_file_name.to_string(),
            layers: Vec::new(),
            depth: 0,
        };

        let exclude_file = vcs_root.as_path().join(".git").join("info").join("exclude");
        if let Some(layer) = read_layer(&vcs_root, &exclude_file, 0)? {
            matcher.layers.push(Arc::new(layer));
        }

        for (depth, dir) in dirs.iter().enumerate() {
            matcher.depth = depth;
            matcher.push_dir(dir)?;
        }

        tracing::debug!(
            "built ignore matcher with {} layer(s) for {}",
            matcher.layers.len(),
            package_dir
        );

        Ok(matcher)
    }

    /// Returns a matcher that additionally honours the ignore file in `dir`, which must be a
    /// direct child of the deepest directory this matcher covers.
    pub fn descend(&self, dir: &AbsolutePath) -> Result<Self, HashingError> {
        let mut matcher = self.clone();
        matcher.depth += 1;
        matcher.push_dir(dir)?;
        Ok(matcher)
    }

    fn push_dir(&mut self, dir: &AbsolutePath) -> Result<(), HashingError> {
        let ignore_file = dir.as_path().join(&self.ignore_file_name);
        if let Some(layer) = read_layer(dir, &ignore_file, self.depth)? {
            self.layers.push(Arc::new(layer));
        }
        Ok(())
    }

    /// Returns true if `path` is excluded. The path must be absolute and its parent directories
    /// must not be excluded themselves.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        for layer in self.layers.iter().rev() {
            // A directory's own ignore file only applies to its entries.
            if !path.starts_with(layer.dir.as_path()) || path == layer.dir.as_path() {
                continue;
            }
            match layer.gitignore.matched(path, is_dir) {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }
        false
    }

    /// Returns true if `dir`, or any directory between the root this matcher was built for and
    /// `dir`, is excluded. Directories outside of the root are never excluded.
    pub fn is_dir_excluded(&self, dir: &AbsolutePath) -> bool {
        let Ok(dir) = dir.normalize() else {
            return false;
        };
        if !dir.starts_with(&self.root) {
            return false;
        }

        let mut chain = Vec::new();
        let mut current = dir;
        while current != self.root {
            let parent = current.parent();
            chain.push(current);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        chain
            .iter()
            .rev()
            .any(|dir| self.is_ignored(dir.as_path(), true))
    }

    /// Returns all rules ordered from the shallowest to the deepest layer, in file order within
    /// a layer.
    pub fn rules(&self) -> impl Iterator<Item = &IgnoreRule> + '_ {
        self.layers.iter().flat_map(|layer| layer.rules.iter())
    }
}

/// Reads and parses a single ignore file anchored at `dir`. Returns `None` if the file does not
/// exist or contains no rules.
fn read_layer(
    dir: &AbsolutePath,
    ignore_file: &Path,
    anchor_depth: usize,
) -> Result<Option<IgnoreLayer>, HashingError> {
    if !ignore_file.is_file() {
        return Ok(None);
    }
    let contents = fs_err::read(ignore_file)
        .map_err(|err| HashingError::Io(ignore_file.to_path_buf(), err))?;
    let contents = String::from_utf8_lossy(&contents);

    let mut builder = GitignoreBuilder::new(dir.as_path());
    let mut rules = Vec::new();
    for line in contents.lines() {
        let Some(rule) = IgnoreRule::parse(line, anchor_depth) else {
            continue;
        };
        match builder.add_line(Some(ignore_file.to_path_buf()), line) {
            Ok(_) => rules.push(rule),
            Err(err) => {
                tracing::warn!("skipping invalid line in {}: {err}", ignore_file.display());
            }
        }
    }

    if rules.is_empty() {
        return Ok(None);
    }

    let gitignore = builder
        .build()
        .map_err(|err| HashingError::IgnoreFile(ignore_file.to_path_buf(), err))?;

    tracing::trace!(
        "read {} rule(s) from {}",
        rules.len(),
        ignore_file.display()
    );

    Ok(Some(IgnoreLayer {
        dir: dir.clone(),
        rules,
        gitignore,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;
    use rstest::rstest;

    fn absolute(path: &Path) -> AbsolutePath {
        AbsolutePath::new(path).unwrap()
    }

    #[rstest]
    #[case("ignoreme", Some(("ignoreme", false, false)))]
    #[case("ignorethisdir/", Some(("ignorethisdir/", false, true)))]
    #[case("!keep.log  ", Some(("keep.log", true, false)))]
    #[case("# comment", None)]
    #[case("   ", None)]
    fn test_parse_rule(#[case] line: &str, #[case] expected: Option<(&str, bool, bool)>) {
        let rule = IgnoreRule::parse(line, 3);
        assert_eq!(
            rule.as_ref()
                .map(|rule| (rule.pattern.as_str(), rule.negated, rule.directory_only)),
            expected
        );
        if let Some(rule) = rule {
            assert_eq!(rule.anchor_depth, 3);
        }
    }

    #[test]
    fn test_layers_are_ordered_by_depth() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let package = root.join("child-dir").join("libA");
        fs::create_dir_all(&package).unwrap();
        fs::write(root.join(".gitignore"), "ignoreme\nignorethisdir/\n").unwrap();
        fs::write(package.join(".gitignore"), "pkgignoreme\npkgignorethisdir/\n").unwrap();

        let matcher =
            IgnoreMatcher::build(&absolute(root), &absolute(&package), ".gitignore").unwrap();
        let rules = matcher
            .rules()
            .map(|rule| (rule.pattern.as_str(), rule.anchor_depth))
            .collect::<Vec<_>>();
        assert_eq!(
            rules,
            vec![
                ("ignoreme", 0),
                ("ignorethisdir/", 0),
                ("pkgignoreme", 2),
                ("pkgignorethisdir/", 2),
            ]
        );

        assert!(matcher.is_ignored(&package.join("ignoreme"), false));
        assert!(matcher.is_ignored(&package.join("pkgignoreme"), false));
        assert!(matcher.is_ignored(&package.join("ignorethisdir"), true));
        assert!(!matcher.is_ignored(&package.join("ignorethisdir"), false));
        assert!(matcher.is_ignored(&package.join("pkgignorethisdir"), true));
        assert!(!matcher.is_ignored(&package.join("some-file"), false));
    }

    #[test]
    fn test_deeper_negation_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let package = root.join("pkg");
        fs::create_dir_all(&package).unwrap();
        fs::write(root.join(".gitignore"), "*.log\n").unwrap();
        fs::write(package.join(".gitignore"), "!important.log\n").unwrap();

        let matcher =
            IgnoreMatcher::build(&absolute(root), &absolute(&package), ".gitignore").unwrap();
        assert!(matcher.is_ignored(&package.join("debug.log"), false));
        assert!(!matcher.is_ignored(&package.join("important.log"), false));
        assert!(matcher.is_ignored(&root.join("important.log"), false));
    }

    #[test]
    fn test_later_line_overrides_earlier_line() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), "*.tmp\n!keep.tmp\n").unwrap();

        let matcher = IgnoreMatcher::build(&absolute(root), &absolute(root), ".gitignore").unwrap();
        assert!(matcher.is_ignored(&root.join("drop.tmp"), false));
        assert!(!matcher.is_ignored(&root.join("keep.tmp"), false));
    }

    #[test]
    fn test_descend_adds_nested_ignore_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let nested = root.join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(".gitignore"), "generated.rs\n").unwrap();

        let matcher = IgnoreMatcher::build(&absolute(root), &absolute(root), ".gitignore").unwrap();
        assert_eq!(matcher.rules().count(), 0);
        assert!(!matcher.is_ignored(&nested.join("generated.rs"), false));

        let nested_matcher = matcher.descend(&absolute(&nested)).unwrap();
        assert!(nested_matcher.is_ignored(&nested.join("generated.rs"), false));
        assert_eq!(nested_matcher.rules().next().unwrap().anchor_depth, 1);
    }

    #[test]
    fn test_excluded_ancestor_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let package = root.join("child-dir").join("libA");
        let sibling = root.join("other-dir").join("libB");
        fs::create_dir_all(&package).unwrap();
        fs::create_dir_all(&sibling).unwrap();
        fs::write(root.join(".gitignore"), "child-dir/
").unwrap();
        // The ignore file of a directory does not exclude the directory itself.
        fs::write(sibling.join(".gitignore"), "libB\n").unwrap();

        let matcher =
            IgnoreMatcher::build(&absolute(root), &absolute(&package), ".gitignore").unwrap();
        assert!(matcher.is_dir_excluded(&absolute(&package)));
        assert!(matcher.is_dir_excluded(&absolute(&root.join("child-dir"))));
        assert!(!matcher.is_dir_excluded(&absolute(root)));

        let matcher =
            IgnoreMatcher::build(&absolute(root), &absolute(&sibling), ".gitignore").unwrap();
        assert!(!matcher.is_dir_excluded(&absolute(&sibling)));
    }

    #[test]
    fn test_git_info_exclude() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git").join("info")).unwrap();
        fs::write(root.join(".git").join("info").join("exclude"), "local-only\n").unwrap();
        fs::write(root.join(".gitignore"), "!local-only\n").unwrap();

        let matcher = IgnoreMatcher::build(&absolute(root), &absolute(root), ".gitignore").unwrap();
        // The repository's own ignore file is more specific than the exclude file.
        assert!(!matcher.is_ignored(&root.join("local-only"), false));
        assert_eq!(matcher.rules().count(), 2);
    }

    #[test]
    fn test_package_outside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("repo");
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(root.join(".gitignore"), "a\n").unwrap();
        fs::write(outside.join(".gitignore"), "b\n").unwrap();

        let matcher =
            IgnoreMatcher::build(&absolute(&root), &absolute(&outside), ".gitignore").unwrap();
        let patterns = matcher
            .rules()
            .map(|rule| rule.pattern.as_str())
            .collect::<Vec<_>>();
        assert_eq!(patterns, vec!["b"]);
    }
}
