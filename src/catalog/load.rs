use anyhow::{Result, anyhow};
use futures_util::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::model::RepositoryCatalog;
use crate::error::ApmError;
use crate::runtime::Runtime;

/// Where a repository description lives.
///
/// `source` identifies the repository (usually the URL the list was
/// downloaded from) and is what installed records refer to; `path` is the
/// local copy of the description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSource {
    pub source: String,
    pub path: PathBuf,
}

impl CatalogSource {
    /// A source identified by its own local path.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            source: path.to_string_lossy().into_owned(),
            path,
        }
    }
}

/// Outcome of loading one repository.
#[derive(Debug)]
pub struct CatalogLoad {
    pub source: CatalogSource,
    pub result: Result<RepositoryCatalog>,
}

impl RepositoryCatalog {
    /// Read and parse a repository description from disk.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, source: &str, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            return Err(ApmError::catalog_parse(
                source,
                format!("package list {:?} does not exist", path),
            )
            .into());
        }

        let text = runtime
            .read_to_string(path)
            .map_err(|e| ApmError::catalog_parse(source, format!("{:#}", e)))?;
        Self::parse(source, &text)
    }
}

/// Load every repository concurrently.
///
/// Each description is parsed on its own blocking task. Failures are kept
/// per repository so one bad list does not hide the others; results come
/// back in input order.
#[tracing::instrument(skip(runtime, sources))]
pub async fn load_catalogs<R: Runtime + 'static>(
    runtime: Arc<R>,
    sources: &[CatalogSource],
) -> Vec<CatalogLoad> {
    let tasks = sources.iter().cloned().map(|source| {
        let runtime = Arc::clone(&runtime);
        tokio::task::spawn_blocking(move || {
            let result = RepositoryCatalog::load(runtime.as_ref(), &source.source, &source.path);
            CatalogLoad { source, result }
        })
    });

    join_all(tasks)
        .await
        .into_iter()
        .zip(sources)
        .map(|(joined, source)| {
            let load = joined.unwrap_or_else(|e| CatalogLoad {
                source: source.clone(),
                result: Err(anyhow!("Catalog loader task failed: {}", e)),
            });
            match &load.result {
                Ok(catalog) => debug!("Loaded {} package(s) from {}", catalog.len(), load.source.source),
                Err(e) => warn!("Failed to load {}: {:#}", load.source.source, e),
            }
            load
        })
        .collect()
}
