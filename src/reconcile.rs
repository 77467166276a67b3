//! Reconciliation of catalogs, installed records and the files on disk.
//!
//! Status is never stored: it is derived each time from the current scan,
//! the catalogs and the installed records.

use anyhow::Result;
use log::debug;
use std::fmt;
use std::path::Path;

use crate::catalog::{PackageFileEntry, PackageRecord, RepositoryCatalog};
use crate::records::InstalledRecords;
use crate::runtime::Runtime;
use crate::scan::installed_files;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallationStatus {
    NotInstalled,
    /// Some of its files are on disk but no record claims them.
    ManuallyInstalled,
    /// Its files are on disk, claimed by another tracked package.
    OtherVersionInstalled,
    /// Tracked, but some required files are missing.
    InstalledButBroken,
    /// Tracked and complete.
    InstalledVersion(String),
}

impl InstallationStatus {
    pub fn installed_version(&self) -> Option<&str> {
        match self {
            InstallationStatus::InstalledVersion(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this status can only come from an installed record.
    pub fn is_tracked(&self) -> bool {
        matches!(
            self,
            InstallationStatus::InstalledButBroken | InstallationStatus::InstalledVersion(_)
        )
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallationStatus::NotInstalled => f.write_str("not installed"),
            InstallationStatus::ManuallyInstalled => f.write_str("manually installed"),
            InstallationStatus::OtherVersionInstalled => f.write_str("other version installed"),
            InstallationStatus::InstalledButBroken => {
                f.write_str("not installed (installed files could not be found)")
            }
            InstallationStatus::InstalledVersion(v) => f.write_str(v),
        }
    }
}

/// Files from `all_files` that no tracked installation claims.
///
/// Every package with a record matching both its id and its catalog's source
/// claims the files it declares: exact paths for file entries, any path
/// starting with the entry's path for directory entries.
pub fn manually_installed_files(
    all_files: &[String],
    installed: &InstalledRecords,
    catalogs: &[RepositoryCatalog],
) -> Vec<String> {
    let claimed: Vec<&PackageFileEntry> = catalogs
        .iter()
        .flat_map(|catalog| {
            catalog
                .iter()
                .filter(move |p| installed.matching(p.id(), catalog.source()).is_some())
        })
        .flat_map(|p| p.files())
        .collect();

    all_files
        .iter()
        .filter(|f| !claimed.iter().any(|entry| entry.claims(f)))
        .cloned()
        .collect()
}

/// Derive the status of `package` from `repository`.
///
/// Presence alone can only yield `NotInstalled`, `ManuallyInstalled` or
/// `OtherVersionInstalled` (manual wins). A matching record always overrides
/// that and checks every required file under `install_root`.
///
/// Required means non-optional and also excludes obsolete and uninstall-only
/// entries, unlike a plain count of every non-optional file.
#[tracing::instrument(skip_all, fields(id = package.id(), repository = repository))]
pub fn installed_status<R: Runtime + ?Sized>(
    runtime: &R,
    package: &PackageRecord,
    repository: &str,
    all_files: &[String],
    manual_files: &[String],
    installed: &InstalledRecords,
    install_root: &Path,
) -> InstallationStatus {
    let mut manual = false;
    let mut present = false;
    for file in package.required_files() {
        manual |= manual_files.iter().any(|f| f == file.path());
        present |= all_files.iter().any(|f| f == file.path());
    }

    let baseline = if manual {
        InstallationStatus::ManuallyInstalled
    } else if present {
        InstallationStatus::OtherVersionInstalled
    } else {
        InstallationStatus::NotInstalled
    };

    let Some(record) = installed.matching(package.id(), repository) else {
        return baseline;
    };

    let total = package.required_files().count();
    let existing = package
        .required_files()
        .filter(|f| f.resolve(install_root).is_some_and(|p| runtime.exists(&p)))
        .count();
    debug!("{}: {}/{} required file(s) present", package.id(), existing, total);

    if existing == total {
        InstallationStatus::InstalledVersion(record.version.clone())
    } else {
        InstallationStatus::InstalledButBroken
    }
}

/// Status of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatus {
    pub repository: String,
    pub id: String,
    pub name: String,
    pub latest_version: Option<String>,
    pub status: InstallationStatus,
}

/// A scan of one installation root, ready to answer status queries.
pub struct Reconciler<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    install_root: &'a Path,
    installed: &'a InstalledRecords,
    all_files: Vec<String>,
    manual_files: Vec<String>,
}

impl<'a, R: Runtime + ?Sized> Reconciler<'a, R> {
    /// Scan `install_root` and work out which files are manually installed.
    #[tracing::instrument(skip_all)]
    pub fn scan(
        runtime: &'a R,
        install_root: &'a Path,
        installed: &'a InstalledRecords,
        catalogs: &[RepositoryCatalog],
    ) -> Result<Self> {
        let all_files = installed_files(runtime, install_root)?;
        let manual_files = manually_installed_files(&all_files, installed, catalogs);
        debug!(
            "{} add-on file(s), {} manually installed",
            all_files.len(),
            manual_files.len()
        );
        Ok(Self {
            runtime,
            install_root,
            installed,
            all_files,
            manual_files,
        })
    }

    pub fn all_files(&self) -> &[String] {
        &self.all_files
    }

    pub fn manual_files(&self) -> &[String] {
        &self.manual_files
    }

    pub fn status(&self, package: &PackageRecord, repository: &str) -> InstallationStatus {
        installed_status(
            self.runtime,
            package,
            repository,
            &self.all_files,
            &self.manual_files,
            self.installed,
            self.install_root,
        )
    }

    /// Status of every package in every catalog, in catalog order.
    pub fn evaluate(&self, catalogs: &[RepositoryCatalog]) -> Vec<PackageStatus> {
        catalogs
            .iter()
            .flat_map(|catalog| {
                catalog.iter().map(move |package| PackageStatus {
                    repository: catalog.source().to_string(),
                    id: package.id().to_string(),
                    name: package.display_name().to_string(),
                    latest_version: package.latest_version().map(String::from),
                    status: self.status(package, catalog.source()),
                })
            })
            .collect()
    }
}
