//! Hashes files by reading their content, for everything version control cannot vouch for.

use std::{collections::HashMap, io::ErrorKind, path::PathBuf, sync::Arc};

use ignore::{DirEntry, WalkBuilder, WalkState};
use parking_lot::Mutex;
use pkghash_digest::{compute_file_blob_digest, GitBlobHash};
use pkghash_paths::{AbsolutePath, AnchoredSystemPath, AnchoredUnixPath};
use rayon::{prelude::*, ThreadPool};

use crate::{ignore_rules::IgnoreMatcher, FileHashes, HashingError};

/// Computes the blob digest of every file in `files`, resolved against `root`.
///
/// Files are hashed in parallel. When `allow_missing` is false the first file that does not
/// exist aborts the whole call and all digests computed so far are discarded. When it is true
/// missing files (and directories) are silently left out.
pub(crate) fn hash_files(
    root: &AbsolutePath,
    files: &[AnchoredSystemPath],
    allow_missing: bool,
    pool: Option<&ThreadPool>,
) -> Result<FileHashes, HashingError> {
    let hash_all = || {
        files
            .par_iter()
            .map(|file| hash_file(root, file, allow_missing))
            .filter_map(Result::transpose)
            .collect::<Result<FileHashes, _>>()
    };

    match pool {
        Some(pool) => pool.install(hash_all),
        None => hash_all(),
    }
}

fn hash_file(
    root: &AbsolutePath,
    file: &AnchoredSystemPath,
    allow_missing: bool,
) -> Result<Option<(AnchoredUnixPath, GitBlobHash)>, HashingError> {
    let path = file.restore_anchor(root);
    match compute_file_blob_digest(&path) {
        Ok(hash) => {
            tracing::trace!("hashed {file}: {hash:x}");
            Ok(Some((file.to_unix(), hash)))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            if allow_missing {
                Ok(None)
            } else {
                Err(HashingError::FileNotFound(file.to_unix()))
            }
        }
        Err(_) if allow_missing && path.is_dir() => Ok(None),
        Err(err) => Err(HashingError::Io(path.into_path_buf(), err)),
    }
}

/// Collects the regular files below `base`, skipping everything `matcher` excludes, and hashes
/// them. Excluded directories are never entered.
///
/// When `base` itself, or any directory between the root of `matcher` and `base`, is excluded the
/// result is empty.
///
/// The keys of the result are relative to `base`.
pub(crate) fn walk_ignored(
    root: &AbsolutePath,
    base: &AnchoredSystemPath,
    matcher: &IgnoreMatcher,
    pool: Option<&ThreadPool>,
) -> Result<FileHashes, HashingError> {
    // The matcher's layers are anchored at normalized directories.
    let base_dir = base.restore_anchor(root).normalize()?;
    if matcher.is_dir_excluded(&base_dir) {
        tracing::debug!("{base_dir} is excluded by an ignore file");
        return Ok(FileHashes::new());
    }

    let files = collect_files(&base_dir, matcher)?;
    tracing::debug!("found {} file(s) to hash below {base_dir}", files.len());

    // The files were just observed to exist, a file disappearing now is an I/O failure and not a
    // missing input.
    hash_files(&base_dir, &files, false, pool)
}

type Matchers = Mutex<HashMap<PathBuf, IgnoreMatcher>>;

fn collect_files(
    base_dir: &AbsolutePath,
    matcher: &IgnoreMatcher,
) -> Result<Vec<AnchoredSystemPath>, HashingError> {
    // Every directory that is entered gets a matcher that includes its own ignore file. The
    // matcher of a directory is always registered before its entries are filtered.
    let matchers: Arc<Matchers> = Arc::new(Mutex::new(HashMap::from([(
        base_dir.as_path().to_path_buf(),
        matcher.clone(),
    )])));
    let first_error: Arc<Mutex<Option<HashingError>>> = Arc::default();
    let files = Mutex::new(Vec::new());

    WalkBuilder::new(base_dir.as_path())
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .filter_entry({
            let matchers = matchers.clone();
            let first_error = first_error.clone();
            move |entry| match keep_entry(entry, &matchers) {
                Ok(keep) => keep,
                Err(err) => {
                    first_error.lock().get_or_insert(err);
                    false
                }
            }
        })
        .build_parallel()
        .run(|| {
            let files = &files;
            let first_error = &first_error;
            Box::new(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        first_error
                            .lock()
                            .get_or_insert(HashingError::Walk(base_dir.as_path().to_path_buf(), err));
                        return WalkState::Quit;
                    }
                };

                let is_file = entry.file_type().is_some_and(|file_type| {
                    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
                });
                if !is_file {
                    return WalkState::Continue;
                }

                match AbsolutePath::new(entry.into_path()).and_then(|path| base_dir.anchor(&path)) {
                    Ok(file) => {
                        files.lock().push(file);
                        WalkState::Continue
                    }
                    Err(err) => {
                        first_error.lock().get_or_insert(err.into());
                        WalkState::Quit
                    }
                }
            })
        });

    if let Some(err) = first_error.lock().take() {
        return Err(err);
    }
    Ok(files.into_inner())
}

/// Decides whether the walk descends into or yields `entry`.
fn keep_entry(entry: &DirEntry, matchers: &Matchers) -> Result<bool, HashingError> {
    let path = entry.path();
    let is_dir = entry.file_type().is_some_and(|file_type| file_type.is_dir());
    if is_dir && entry.file_name() == ".git" {
        return Ok(false);
    }

    let Some(matcher) = path
        .parent()
        .and_then(|parent| matchers.lock().get(parent).cloned())
    else {
        return Ok(false);
    };

    if matcher.is_ignored(path, is_dir) {
        if is_dir {
            tracing::trace!("pruning ignored directory {}", path.display());
        }
        return Ok(false);
    }

    if is_dir {
        let child = matcher.descend(&AbsolutePath::new(path)?)?;
        matchers.lock().insert(path.to_path_buf(), child);
    }
    Ok(true)
}
