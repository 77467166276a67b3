//! Placement and removal of package files under an installation root.

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::catalog::PackageFileEntry;
use crate::error::ApmError;
use crate::runtime::{Runtime, join_contained};

/// One copy from the staged tree to the installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl CopyPlan {
    /// Plan the copy of `entry`: the staged source is the entry's basename,
    /// looked up under its archive path when one is given.
    ///
    /// Fails if either path would leave its root.
    pub fn for_entry(
        staged_root: &Path,
        install_root: &Path,
        entry: &PackageFileEntry,
    ) -> Result<Self, ApmError> {
        let base = match entry.archive_path() {
            Some(archive_path) => {
                join_contained(staged_root, archive_path).ok_or_else(|| outside_root(entry))?
            }
            None => staged_root.to_path_buf(),
        };
        Ok(Self {
            source: base.join(entry.basename()),
            destination: entry.resolve(install_root).ok_or_else(|| outside_root(entry))?,
        })
    }

    fn execute<R: Runtime + ?Sized>(&self, runtime: &R) -> Result<u64> {
        if runtime.is_dir(&self.source) {
            return runtime.copy_tree(&self.source, &self.destination);
        }
        if let Some(parent) = self.destination.parent()
            && !runtime.exists(parent)
        {
            runtime.create_dir_all(parent)?;
        }
        runtime.copy(&self.source, &self.destination)
    }
}

pub struct Installer<R: Runtime> {
    runtime: Arc<R>,
}

impl<R: Runtime + 'static> Installer<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }

    /// Install a package from an already extracted `staged_root`.
    ///
    /// A whole program is merged into `install_root` as is. Otherwise the
    /// obsolete entries are deleted and every installable entry is copied
    /// concurrently; optional entries absent from the staged tree are
    /// skipped. Either way the required entries are checked afterwards.
    /// Nothing is rolled back on failure.
    #[tracing::instrument(skip(self, files))]
    pub async fn install(
        &self,
        staged_root: &Path,
        install_root: &Path,
        files: &[PackageFileEntry],
        whole_program: bool,
    ) -> Result<()> {
        if whole_program {
            let runtime = Arc::clone(&self.runtime);
            let (from, to) = (staged_root.to_path_buf(), install_root.to_path_buf());
            let copied = tokio::task::spawn_blocking(move || runtime.copy_tree(&from, &to))
                .await
                .map_err(|e| anyhow!("Copy task failed: {}", e))?
                .map_err(|e| ApmError::install_copy(install_root, &e))?;
            info!("Copied {} file(s) from {:?}", copied, staged_root);
        } else {
            let mut plans = Vec::new();
            for entry in files.iter().filter(|f| !f.is_uninstall_only() && !f.is_obsolete()) {
                let plan = CopyPlan::for_entry(staged_root, install_root, entry)?;
                if entry.is_optional() && !self.runtime.exists(&plan.source) {
                    debug!("Optional {} not in the staged tree, skipping", entry.path());
                    continue;
                }
                plans.push(plan);
            }
            self.remove_obsolete(install_root, files)?;
            self.copy_all(plans).await?;
        }

        self.verify_installed(install_root, files)
    }

    /// Remove every entry the package owns except obsolete ones, then check
    /// that none of them is left.
    #[tracing::instrument(skip(self, files))]
    pub fn uninstall(&self, install_root: &Path, files: &[PackageFileEntry]) -> Result<()> {
        let owned: Vec<&PackageFileEntry> = files.iter().filter(|f| !f.is_obsolete()).collect();
        for entry in &owned {
            self.remove_entry(install_root, entry)?;
        }

        let remaining: Vec<String> = owned
            .iter()
            .filter(|f| self.is_present(install_root, f))
            .map(|f| f.path().to_string())
            .collect();
        if !remaining.is_empty() {
            return Err(ApmError::UninstallVerification { remaining }.into());
        }
        info!("Removed {} entr(ies) from {:?}", owned.len(), install_root);
        Ok(())
    }

    fn remove_obsolete(&self, install_root: &Path, files: &[PackageFileEntry]) -> Result<()> {
        for entry in files.iter().filter(|f| f.is_obsolete()) {
            self.remove_entry(install_root, entry)?;
        }
        Ok(())
    }

    /// Delete one entry, recursively when the catalog declares a directory.
    fn remove_entry(&self, install_root: &Path, entry: &PackageFileEntry) -> Result<()> {
        let path = entry.resolve(install_root).ok_or_else(|| outside_root(entry))?;
        if !self.runtime.exists(&path) {
            return Ok(());
        }
        debug!("Removing {:?}", path);
        let removed = if entry.is_directory() {
            self.runtime.remove_dir_all(&path)
        } else {
            self.runtime.remove_file(&path)
        };
        removed.map_err(|e| ApmError::install_copy(&path, &e).into())
    }

    /// Run every copy on its own blocking task and wait for all of them.
    ///
    /// When several copies fail, the one that comes first in the plan is
    /// reported.
    async fn copy_all(&self, plans: Vec<CopyPlan>) -> Result<()> {
        let mut copies = JoinSet::new();
        for (index, plan) in plans.into_iter().enumerate() {
            let runtime = Arc::clone(&self.runtime);
            copies.spawn_blocking(move || {
                let result = plan.execute(runtime.as_ref());
                (index, plan, result)
            });
        }

        let mut first_error: Option<(usize, ApmError)> = None;
        while let Some(joined) = copies.join_next().await {
            let (index, plan, result) = joined.map_err(|e| anyhow!("Copy task failed: {}", e))?;
            match result {
                Ok(bytes) => debug!("Copied {:?} ({} bytes)", plan.destination, bytes),
                Err(e) => {
                    warn!("Failed to copy {:?}: {:#}", plan.source, e);
                    if first_error.as_ref().is_none_or(|(i, _)| index < *i) {
                        first_error = Some((index, ApmError::install_copy(&plan.destination, &e)));
                    }
                }
            }
        }

        match first_error {
            Some((_, err)) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn verify_installed(&self, install_root: &Path, files: &[PackageFileEntry]) -> Result<()> {
        let missing: Vec<String> = files
            .iter()
            .filter(|f| f.is_required())
            .filter(|f| !self.is_present(install_root, f))
            .map(|f| f.path().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApmError::InstallVerification { missing }.into())
        }
    }

    fn is_present(&self, install_root: &Path, entry: &PackageFileEntry) -> bool {
        entry
            .resolve(install_root)
            .is_some_and(|path| self.runtime.exists(&path))
    }
}

fn outside_root(entry: &PackageFileEntry) -> ApmError {
    ApmError::InstallCopy {
        path: PathBuf::from(entry.path()),
        message: "path is outside the installation root".to_string(),
    }
}
