//! Lexical checks for catalog-supplied paths.

use std::path::{Component, Path, PathBuf};

/// Whether `path` is relative and stays inside whatever base it is joined to.
///
/// Only plain segments and `.` are accepted. Absolute paths, `..`, a root or
/// a drive prefix are rejected without touching the filesystem.
pub fn is_contained_path(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Join `path` onto `base`, or `None` if the result would leave `base`.
pub fn join_contained(base: &Path, path: &str) -> Option<PathBuf> {
    is_contained_path(path).then(|| base.join(path))
}
