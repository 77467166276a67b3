use anyhow::Result;
use std::sync::Arc;

use crate::{config::Config, records::RecordStore, reconcile::Reconciler, runtime::Runtime};

use super::load_configured_catalogs;

/// List add-on files that no tracked installation accounts for
#[tracing::instrument(skip(runtime, config))]
pub async fn manual<R: Runtime + 'static>(runtime: Arc<R>, config: Config) -> Result<()> {
    let catalogs = load_configured_catalogs(&runtime, &config).await?;
    let installed = RecordStore::new(runtime.as_ref(), &config.install_root).load()?;
    let reconciler = Reconciler::scan(runtime.as_ref(), &config.install_root, &installed, &catalogs)?;

    if reconciler.manual_files().is_empty() {
        println!("No manually installed files.");
        return Ok(());
    }
    for file in reconciler.manual_files() {
        println!("{}", file);
    }
    Ok(())
}
