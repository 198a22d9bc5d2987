#![deny(missing_docs)]
//! A crate for resolving explicit input patterns against a directory tree.
//!
//! Patterns are evaluated in order. A pattern selects files, a pattern starting with `!`
//! removes files selected by the patterns before it. Because the last pattern that matches a
//! path decides its fate, an exclusion never removes a file that no earlier pattern selected and
//! a later inclusion can add a file back.
//!
//! # Glob Semantics
//!
//! - **Supported syntax**: `*` (any run of characters within a path segment), `**` (any number of
//!   path segments), `?` and `{a,b,c}` alternation.
//!
//! - **Anchoring**: every pattern is anchored to the search root. `*.txt` matches `a.txt` but not
//!   `sub/a.txt`, use `**/*.txt` to match at any depth.
//!
//! - **Relative patterns and rebasing**: Patterns starting with `..` components (e.g.,
//!   `../src/*.rs`) are **rebased** onto a common ancestor directory called the **effective walk
//!   root**. For example, searching from `/project/subdir` with patterns `["../src/*.rs", "*.txt"]`
//!   walks from `/project`, transforming the patterns to `/src/*.rs` and `/subdir/*.txt`
//!   respectively. This allows a single pass over the tree even when patterns reference
//!   different directories.
//!
//! - **Directories**: a pattern that names a directory selects every file below it. Directories
//!   themselves are never returned.
//!
//! - **No automatic ignoring**: hidden files are candidates like any other file and no ignore
//!   files are consulted. Explicit patterns are authoritative. Only `.git` directories are never
//!   entered.

mod glob_set;

pub use glob_set::{GlobSet, GlobSetError, WalkRootsError};
