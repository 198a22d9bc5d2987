use std::io;

use pkghash_glob::{GlobSet, GlobSetError, WalkRootsError};
use pkghash_paths::{AbsolutePath, AnchoredSystemPath, PathError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::instrument;

use crate::{
    ignore_rules::IgnoreMatcher,
    manual::{hash_files, walk_ignored},
    vcs::{hash_tracked_changes, GitCli, TrackedChanges, VersionControl},
    FileHashes, HashingError, HashingOptions,
};

/// Computes the fingerprints of packages.
///
/// A hasher carries no state between calls apart from its configuration, its version control
/// backend and, optionally, a dedicated thread pool. It can be shared freely between threads.
///
/// ```no_run
/// # use pkghash::{PackageHasher, HashingOptions};
/// # use pkghash_paths::{AbsolutePath, AnchoredSystemPath};
/// let hasher = PackageHasher::new(HashingOptions::default()).unwrap();
/// let root = AbsolutePath::from_cwd().unwrap();
/// let hashes = hasher
///     .get_package_file_hashes(&root, &AnchoredSystemPath::new("packages/ui").unwrap(), &[] as &[&str])
///     .unwrap();
/// for (path, hash) in &hashes {
///     println!("{path} {hash:x}");
/// }
/// ```
#[derive(Debug)]
pub struct PackageHasher<V = GitCli> {
    options: HashingOptions,
    vcs: V,
    pool: Option<ThreadPool>,
}

impl Default for PackageHasher<GitCli> {
    fn default() -> Self {
        let options = HashingOptions::default();
        Self {
            vcs: GitCli::from_options(&options),
            options,
            pool: None,
        }
    }
}

impl PackageHasher<GitCli> {
    /// Constructs a hasher that queries git as configured by `options`.
    pub fn new(options: HashingOptions) -> Result<Self, HashingError> {
        let vcs = GitCli::from_options(&options);
        Self::with_vcs(options, vcs)
    }
}

impl<V: VersionControl> PackageHasher<V> {
    /// Constructs a hasher that uses a custom version control backend.
    pub fn with_vcs(options: HashingOptions, vcs: V) -> Result<Self, HashingError> {
        options.validate()?;
        let pool = options
            .hashing_threads
            .map(|threads| {
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|index| format!("pkghash-{index}"))
                    .build()
            })
            .transpose()?;
        Ok(Self { options, vcs, pool })
    }

    /// Returns the options this hasher was created with.
    pub fn options(&self) -> &HashingOptions {
        &self.options
    }

    /// Hashes every file in `files`. Fails with [`HashingError::FileNotFound`] if any of them
    /// does not exist, in which case no hashes are returned at all.
    #[instrument(skip_all, fields(root = %root, files = files.len()))]
    pub fn get_hashes_for_files(
        &self,
        root: &AbsolutePath,
        files: &[AnchoredSystemPath],
    ) -> Result<FileHashes, HashingError> {
        hash_files(root, files, false, self.pool.as_ref())
    }

    /// Hashes the files in `files` that exist and silently skips the rest.
    #[instrument(skip_all, fields(root = %root, files = files.len()))]
    pub fn get_hashes_for_existing_files(
        &self,
        root: &AbsolutePath,
        files: &[AnchoredSystemPath],
    ) -> Result<FileHashes, HashingError> {
        hash_files(root, files, true, self.pool.as_ref())
    }

    /// Computes the fingerprint of the package at `package` (relative to `root`).
    ///
    /// Without `input_patterns` every file of the package that is not ignored is hashed. Version
    /// control provides the hashes of unchanged tracked files; when it is unavailable the package
    /// is walked instead. With `input_patterns` exactly the matching files plus the configured
    /// manifest files are hashed and ignore files are not consulted.
    ///
    /// The keys of the result are relative to the package directory.
    #[instrument(skip_all, fields(root = %root, package = %package, patterns = input_patterns.len()))]
    pub fn get_package_file_hashes<S: AsRef<str>>(
        &self,
        root: &AbsolutePath,
        package: &AnchoredSystemPath,
        input_patterns: &[S],
    ) -> Result<FileHashes, HashingError> {
        if input_patterns.is_empty() {
            self.hash_all_package_files(root, package)
        } else {
            self.hash_matching_package_files(root, package, input_patterns)
        }
    }

    fn hash_all_package_files(
        &self,
        root: &AbsolutePath,
        package: &AnchoredSystemPath,
    ) -> Result<FileHashes, HashingError> {
        let package_dir = package.restore_anchor(root);
        match hash_tracked_changes(&self.vcs, root, package) {
            Ok(TrackedChanges {
                mut hashes,
                to_hash,
            }) => {
                tracing::debug!("using version control hashes for {package_dir}");
                hashes.extend(hash_files(
                    &package_dir,
                    &to_hash,
                    false,
                    self.pool.as_ref(),
                )?);
                Ok(hashes)
            }
            Err(err) if err.is_outside_repository() => Err(HashingError::PathOutsideRepository {
                root: root.as_path().to_path_buf(),
                package: package.to_unix().to_string(),
            }),
            Err(err) => {
                tracing::warn!(
                    "failed to read hashes from version control, hashing {package_dir} manually: {err}"
                );
                let matcher =
                    IgnoreMatcher::build(root, &package_dir, &self.options.ignore_file_name)?;
                walk_ignored(root, package, &matcher, self.pool.as_ref())
            }
        }
    }

    fn hash_matching_package_files<S: AsRef<str>>(
        &self,
        root: &AbsolutePath,
        package: &AnchoredSystemPath,
        input_patterns: &[S],
    ) -> Result<FileHashes, HashingError> {
        let package_dir = package.restore_anchor(root);
        if !package_dir.is_dir() {
            return Err(HashingError::Io(
                package_dir.into_path_buf(),
                io::Error::new(io::ErrorKind::NotFound, "the package directory does not exist"),
            ));
        }

        // The manifest files come last so no exclusion can remove them.
        let patterns = input_patterns
            .iter()
            .map(|pattern| pattern.as_ref())
            .chain(self.options.manifest_files.iter().map(String::as_str));
        let glob_set = GlobSet::create(patterns)?;
        let matches = glob_set
            .collect_matching(package_dir.as_path())
            .map_err(|err| match err {
                GlobSetError::Walk(path, err) => HashingError::Walk(path, err),
                GlobSetError::WalkRoots(WalkRootsError::MissingRoot(path)) => HashingError::Io(
                    path,
                    io::Error::new(io::ErrorKind::NotFound, "the directory does not exist"),
                ),
                err => HashingError::InvalidPattern(err),
            })?;

        tracing::debug!(
            "{} file(s) of {package_dir} match the input patterns",
            matches.len()
        );

        let files = matches
            .into_iter()
            .map(|path| package_dir.anchor(&AbsolutePath::new(path)?))
            .collect::<Result<Vec<_>, PathError>>()?;

        hash_files(&package_dir, &files, false, self.pool.as_ref())
    }
}
