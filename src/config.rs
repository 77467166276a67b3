use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

use crate::catalog::CatalogSource;
use crate::runtime::Runtime;

pub const CONFIG_FILE: &str = "config.toml";
/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "APM_CONFIG";
const APP_DIR: &str = "apm";

/// Settings read from `<config dir>/apm/config.toml`.
///
/// ```toml
/// install_root = "/opt/aviutl"
///
/// [[catalogs]]
/// source = "https://example.com/packages.xml"
/// path = "/var/cache/apm/packages.xml"
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub install_root: Option<PathBuf>,
    #[serde(default)]
    pub catalogs: Vec<CatalogSource>,
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub install_root: PathBuf,
    pub catalogs: Vec<CatalogSource>,
}

impl Config {
    /// Resolve settings: command-line values (clap has already folded in the
    /// environment) win over the config file, which wins over defaults.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(
        runtime: &R,
        install_root: Option<PathBuf>,
        catalogs: Vec<PathBuf>,
    ) -> Result<Self> {
        let file = ConfigFile::load(runtime)?;

        let install_root = match install_root.or(file.install_root) {
            Some(root) => root,
            None => runtime
                .current_dir()
                .context("Could not determine the installation root")?,
        };
        debug!("Using install root: {:?}", install_root);

        let catalogs = if catalogs.is_empty() {
            file.catalogs
        } else {
            catalogs.into_iter().map(CatalogSource::local).collect()
        };
        debug!("Using {} catalog(s)", catalogs.len());

        Ok(Self {
            install_root,
            catalogs,
        })
    }
}

impl ConfigFile {
    /// `$APM_CONFIG` if set, else `<config dir>/apm/config.toml`.
    pub fn path<R: Runtime + ?Sized>(runtime: &R) -> Option<PathBuf> {
        if let Ok(path) = runtime.env_var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        runtime
            .config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Read the config file; a missing file or config directory yields defaults.
    pub fn load<R: Runtime + ?Sized>(runtime: &R) -> Result<Self> {
        let Some(path) = Self::path(runtime) else {
            debug!("No config directory");
            return Ok(Self::default());
        };
        if !runtime.exists(&path) {
            debug!("No config file at {:?}", path);
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(&path)?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }
}
