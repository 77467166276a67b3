use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::runtime::join_contained;

/// A file or directory that a package places under the installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFileEntry {
    pub(super) path: String,
    pub(super) optional: bool,
    pub(super) is_directory: bool,
    pub(super) archive_path: Option<String>,
    pub(super) uninstall_only: bool,
    pub(super) obsolete: bool,
}

impl PackageFileEntry {
    /// A required, plain file entry.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            optional: false,
            is_directory: false,
            archive_path: None,
            uninstall_only: false,
            obsolete: false,
        }
    }

    pub fn with_optional(self) -> Self {
        Self { optional: true, ..self }
    }

    pub fn with_directory(self) -> Self {
        Self {
            is_directory: true,
            ..self
        }
    }

    pub fn with_archive_path(self, archive_path: impl Into<String>) -> Self {
        Self {
            archive_path: Some(archive_path.into()),
            ..self
        }
    }

    pub fn with_uninstall_only(self) -> Self {
        Self {
            uninstall_only: true,
            ..self
        }
    }

    pub fn with_obsolete(self) -> Self {
        Self {
            obsolete: true,
            ..self
        }
    }

    /// Install-time path relative to the installation root, `/`-separated.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn archive_path(&self) -> Option<&str> {
        self.archive_path.as_deref()
    }

    pub fn is_uninstall_only(&self) -> bool {
        self.uninstall_only
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete
    }

    /// Last path segment, ignoring a trailing `/` on directory entries.
    pub fn basename(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Location of this entry under `root`, or `None` if its path would
    /// leave `root`.
    pub fn resolve(&self, root: &Path) -> Option<PathBuf> {
        join_contained(root, &self.path)
    }

    /// Whether this entry is expected on disk once its package is installed.
    ///
    /// Obsolete entries are deleted and uninstall-only entries are never
    /// copied, so neither takes part in presence or completeness checks.
    pub fn is_required(&self) -> bool {
        !self.optional && !self.uninstall_only && !self.obsolete
    }

    /// Whether `file` is claimed by this entry: an exact match for files, a
    /// prefix match for directory entries.
    pub fn claims(&self, file: &str) -> bool {
        if self.is_directory {
            file.starts_with(&self.path)
        } else {
            file == self.path
        }
    }
}

/// Package type tags from the fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    // plugins
    Input,
    Output,
    Filter,
    Color,
    Language,
    // scripts
    Animation,
    Object,
    Scene,
    Camera,
    Track,
    /// A tag outside the vocabulary, kept verbatim.
    Unknown(String),
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Input => "input",
            Category::Output => "output",
            Category::Filter => "filter",
            Category::Color => "color conversion",
            Category::Language => "language",
            Category::Animation => "animation effect",
            Category::Object => "custom object",
            Category::Scene => "scene change",
            Category::Camera => "camera control",
            Category::Track => "track bar",
            Category::Unknown(_) => "unknown",
        }
    }
}

impl From<&str> for Category {
    fn from(tag: &str) -> Self {
        match tag {
            "input" => Category::Input,
            "output" => Category::Output,
            "filter" => Category::Filter,
            "color" => Category::Color,
            "language" => Category::Language,
            "animation" => Category::Animation,
            "object" => Category::Object,
            "scene" => Category::Scene,
            "camera" => Category::Camera,
            "track" => Category::Track,
            other => Category::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One package as declared by a repository.
///
/// Scalar fields missing from the description are `None`; a present but
/// empty field is `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub(super) id: String,
    pub(super) name: Option<String>,
    pub(super) overview: Option<String>,
    pub(super) description: Option<String>,
    pub(super) categories: Vec<Category>,
    pub(super) page_url: Option<String>,
    pub(super) download_url: Option<String>,
    pub(super) download_mirror_url: Option<String>,
    pub(super) latest_version: Option<String>,
    pub(super) detail_url: Option<String>,
    pub(super) files: Vec<PackageFileEntry>,
    pub(super) installer: Option<String>,
    pub(super) install_arg: Option<String>,
}

impl PackageRecord {
    /// A record with only an id and a file list.
    pub fn new(id: impl Into<String>, files: Vec<PackageFileEntry>) -> Self {
        Self {
            id: id.into(),
            name: None,
            overview: None,
            description: None,
            categories: Vec::new(),
            page_url: None,
            download_url: None,
            download_mirror_url: None,
            latest_version: None,
            detail_url: None,
            files,
            installer: None,
            install_arg: None,
        }
    }

    pub fn with_latest_version(self, version: impl Into<String>) -> Self {
        Self {
            latest_version: Some(version.into()),
            ..self
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn overview(&self) -> Option<&str> {
        self.overview.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    pub fn download_mirror_url(&self) -> Option<&str> {
        self.download_mirror_url.as_deref()
    }

    pub fn latest_version(&self) -> Option<&str> {
        self.latest_version.as_deref()
    }

    pub fn detail_url(&self) -> Option<&str> {
        self.detail_url.as_deref()
    }

    pub fn files(&self) -> &[PackageFileEntry] {
        &self.files
    }

    pub fn installer(&self) -> Option<&str> {
        self.installer.as_deref()
    }

    pub fn install_arg(&self) -> Option<&str> {
        self.install_arg.as_deref()
    }

    /// Entries that must be on disk for a complete install: non-optional,
    /// and neither obsolete nor uninstall-only.
    pub fn required_files(&self) -> impl Iterator<Item = &PackageFileEntry> {
        self.files.iter().filter(|f| f.is_required())
    }
}

/// Packages of one repository source, keyed by id in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryCatalog {
    source: String,
    packages: Vec<PackageRecord>,
    index: HashMap<String, usize>,
}

impl RepositoryCatalog {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            packages: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a catalog from records; a repeated id replaces the earlier
    /// record in place.
    pub fn from_records(
        source: impl Into<String>,
        records: impl IntoIterator<Item = PackageRecord>,
    ) -> Self {
        let mut catalog = Self::new(source);
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    pub(crate) fn insert(&mut self, record: PackageRecord) {
        match self.index.get(record.id()) {
            Some(&pos) => self.packages[pos] = record,
            None => {
                self.index.insert(record.id.clone(), self.packages.len());
                self.packages.push(record);
            }
        }
    }

    /// The URL or path this catalog was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get(&self, id: &str) -> Option<&PackageRecord> {
        self.index.get(id).map(|&pos| &self.packages[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
