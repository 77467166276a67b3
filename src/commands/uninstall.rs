use anyhow::{Context, Result};
use log::{debug, warn};
use std::sync::Arc;

use crate::{
    config::Config,
    install::Installer,
    records::RecordStore,
    runtime::Runtime,
};

use super::{find_package, load_configured_catalogs};

/// Remove a package's files and forget its record
#[tracing::instrument(skip(runtime, config))]
pub async fn uninstall<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: Config,
    id: &str,
    repository: Option<&str>,
    yes: bool,
) -> Result<()> {
    let catalogs = load_configured_catalogs(&runtime, &config).await?;
    let (catalog, package) = find_package(&catalogs, id, repository)?;

    let store = RecordStore::new(runtime.as_ref(), &config.install_root);
    let mut records = store.load()?;
    if records.matching(id, catalog.source()).is_none() {
        warn!("{} is not recorded as installed from {}", id, catalog.source());
    }

    let present: Vec<&str> = package
        .files()
        .iter()
        .filter(|f| !f.is_obsolete())
        .filter(|f| {
            f.resolve(&config.install_root)
                .is_some_and(|p| runtime.exists(&p))
        })
        .map(|f| f.path())
        .collect();
    debug!("{} of {} entries present", present.len(), package.files().len());

    if !yes {
        println!("The following will be removed from {}:", config.install_root.display());
        for path in &present {
            println!("  {}", path);
        }
        if present.is_empty() {
            println!("  (no files present)");
        }
        if !runtime.confirm("Proceed with removal?")? {
            println!("Removal cancelled.");
            return Ok(());
        }
    }

    Installer::new(Arc::clone(&runtime))
        .uninstall(&config.install_root, package.files())
        .with_context(|| format!("Failed to uninstall {}", id))?;

    if records.matching(id, catalog.source()).is_some() {
        records.remove(id);
        store.save(&records)?;
    }

    println!("Removed {}", package.display_name());
    Ok(())
}
