//! File system operations (read, write, copy, remove, directory).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn rename_impl(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).with_context(|| format!("Failed to rename {:?} to {:?}", from, to))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn copy_impl(&self, from: &Path, to: &Path) -> Result<u64> {
        fs::copy(from, to).with_context(|| format!("Failed to copy {:?} to {:?}", from, to))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn copy_tree_impl(&self, from: &Path, to: &Path) -> Result<u64> {
        let mut copied = 0;
        for entry in WalkDir::new(from).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to walk {:?}", from))?;
            let relative = entry
                .path()
                .strip_prefix(from)
                .with_context(|| format!("{:?} escaped {:?}", entry.path(), from))?;
            let target = to.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create directory {:?}", target))?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create directory {:?}", parent))?;
                }
                fs::copy(entry.path(), &target)
                    .with_context(|| format!("Failed to copy {:?} to {:?}", entry.path(), target))?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("Failed to create directory {:?}", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Failed to remove file {:?}", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory {:?} and its contents", path))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_dir_impl(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_file_impl(&self, path: &Path) -> bool {
        path.is_file()
    }

    // No context here: callers inspect the io::Error kind.
    #[tracing::instrument(skip(self))]
    pub(crate) fn read_dir_impl(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)?.map(|entry| Ok(entry?.path())).collect()
    }
}
