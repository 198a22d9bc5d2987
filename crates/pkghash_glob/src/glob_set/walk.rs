use std::path::{Path, PathBuf};

use ignore::{overrides::OverrideBuilder, WalkBuilder, WalkState};
use parking_lot::Mutex;

use super::GlobSetError;

/// Walks `root` with a parallel walker and returns all regular files for which the last
/// matching glob is an inclusion.
///
/// No directories are pruned by the globs themselves: an exclusion that matches a directory does
/// not prevent a later inclusion from selecting a file below it. Only `.git` directories are
/// skipped.
pub(crate) fn walk_globs(root: &Path, globs: &[String]) -> Result<Vec<PathBuf>, GlobSetError> {
    let mut builder = OverrideBuilder::new(root);
    for glob in globs {
        builder.add(glob).map_err(GlobSetError::BuildOverrides)?;
    }
    let overrides = builder.build().map_err(GlobSetError::BuildOverrides)?;

    let matches = Mutex::new(Vec::new());
    let first_error = Mutex::new(None);

    WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build_parallel()
        .run(|| {
            let overrides = &overrides;
            let matches = &matches;
            let first_error = &first_error;
            Box::new(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        first_error.lock().get_or_insert(err);
                        return WalkState::Quit;
                    }
                };

                let is_file = entry.file_type().is_some_and(|file_type| {
                    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
                });
                if is_file && overrides.matched(entry.path(), false).is_whitelist() {
                    matches.lock().push(entry.into_path());
                }

                WalkState::Continue
            })
        });

    if let Some(err) = first_error.into_inner() {
        return Err(GlobSetError::Walk(root.to_path_buf(), err));
    }

    let mut matches = matches.into_inner();
    matches.sort();
    Ok(matches)
}
