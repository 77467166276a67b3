use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use crate::{
    config::Config,
    install::Installer,
    records::RecordStore,
    runtime::Runtime,
};

use super::{find_package, load_configured_catalogs};

/// Version recorded for packages whose catalog entry has no latest version.
pub(crate) const UNKNOWN_VERSION: &str = "unknown";

/// Install a package from an already extracted directory and record it
#[tracing::instrument(skip(runtime, config))]
pub async fn install<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: Config,
    id: &str,
    repository: Option<&str>,
    staged_root: &Path,
    whole_program: bool,
) -> Result<()> {
    if !runtime.is_dir(staged_root) {
        bail!("Staged directory {:?} does not exist.", staged_root);
    }

    let catalogs = load_configured_catalogs(&runtime, &config).await?;
    let (catalog, package) = find_package(&catalogs, id, repository)?;
    debug!(
        "Installing {} from {} ({} file entries)",
        id,
        catalog.source(),
        package.files().len()
    );

    // Read the records first so a broken apm.json fails before any file moves.
    let store = RecordStore::new(runtime.as_ref(), &config.install_root);
    let mut records = store.load()?;

    Installer::new(Arc::clone(&runtime))
        .install(staged_root, &config.install_root, package.files(), whole_program)
        .await
        .with_context(|| format!("Failed to install {}", id))?;

    let version = package.latest_version().unwrap_or(UNKNOWN_VERSION);
    records.insert(package.id(), catalog.source(), version);
    store.save(&records)?;
    info!("Recorded {} {} from {}", id, version, catalog.source());

    println!("Installed {} {}", package.display_name(), version);
    Ok(())
}
