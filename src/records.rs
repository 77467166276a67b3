//! Installed-package records and their on-disk store.
//!
//! The reconciler only needs the in-memory [`InstalledRecords`] map. The CLI
//! persists it as `apm.json` in the installation root, keeping any other
//! top-level keys it finds there untouched.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const RECORDS_FILE: &str = "apm.json";

/// The manager's claim that it placed `version` of a package from `repository`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InstalledRecord {
    #[serde(default)]
    pub id: String,
    pub repository: String,
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InstalledRecords {
    #[serde(default)]
    packages: BTreeMap<String, InstalledRecord>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl InstalledRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an install, replacing any previous record for `id`.
    pub fn insert(&mut self, id: &str, repository: &str, version: &str) {
        self.packages.insert(
            id.to_string(),
            InstalledRecord {
                id: id.to_string(),
                repository: repository.to_string(),
                version: version.to_string(),
            },
        );
    }

    pub fn remove(&mut self, id: &str) -> Option<InstalledRecord> {
        self.packages.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&InstalledRecord> {
        self.packages.get(id)
    }

    /// The record for `id`, only if it was installed from `repository`.
    pub fn matching(&self, id: &str, repository: &str) -> Option<&InstalledRecord> {
        self.packages.get(id).filter(|r| r.repository == repository)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstalledRecord)> {
        self.packages.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Reads and writes `apm.json` under an installation root.
pub struct RecordStore<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime + ?Sized> RecordStore<'a, R> {
    pub fn new(runtime: &'a R, install_root: &Path) -> Self {
        Self {
            runtime,
            path: install_root.join(RECORDS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the records; a missing file means nothing is installed yet.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Result<InstalledRecords> {
        if !self.runtime.exists(&self.path) {
            debug!("No records at {:?}", self.path);
            return Ok(InstalledRecords::new());
        }
        let content = self.runtime.read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse installed records {:?}", self.path))
    }

    /// Write the records through a temporary file and rename it into place.
    #[tracing::instrument(skip(self, records))]
    pub fn save(&self, records: &InstalledRecords) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        self.runtime.write(&tmp_path, json.as_bytes())?;
        self.runtime
            .rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to save installed records to {:?}", self.path))
    }
}
