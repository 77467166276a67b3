use anyhow::Result;
use log::debug;
use std::sync::Arc;

use crate::{
    config::Config,
    records::RecordStore,
    reconcile::{PackageStatus, Reconciler},
    runtime::Runtime,
};

use super::load_configured_catalogs;

/// List every package of every catalog with its installation status
#[tracing::instrument(skip(runtime, config))]
pub async fn list<R: Runtime + 'static>(runtime: Arc<R>, config: Config) -> Result<()> {
    let catalogs = load_configured_catalogs(&runtime, &config).await?;
    let installed = RecordStore::new(runtime.as_ref(), &config.install_root).load()?;
    debug!("{} installed record(s)", installed.len());

    let reconciler = Reconciler::scan(runtime.as_ref(), &config.install_root, &installed, &catalogs)?;
    let statuses = reconciler.evaluate(&catalogs);
    if statuses.is_empty() {
        println!("No packages available.");
        return Ok(());
    }

    let mut current_repository = None;
    for status in &statuses {
        if current_repository != Some(status.repository.as_str()) {
            if current_repository.is_some() {
                println!();
            }
            println!("{}:", status.repository);
            current_repository = Some(status.repository.as_str());
        }
        println!("  {}", format_status_line(status));
    }

    Ok(())
}

pub(crate) fn format_status_line(status: &PackageStatus) -> String {
    let mut line = format!("{} ({}): {}", status.id, status.name, status.status);
    if let Some(latest) = &status.latest_version
        && status.status.installed_version() != Some(latest.as_str())
    {
        line.push_str(&format!(" [latest: {}]", latest));
    }
    line
}
