use anyhow::{Result, bail};
use log::debug;
use std::sync::Arc;

use crate::{
    catalog::{PackageRecord, RepositoryCatalog, load_catalogs},
    config::Config,
    runtime::Runtime,
};

mod install;
mod list;
mod manual;
mod show;
mod uninstall;

pub use install::install;
pub use list::list;
pub use manual::manual;
pub use show::show;
pub use uninstall::uninstall;

/// Load every configured catalog, skipping (with a warning) those that fail.
#[tracing::instrument(skip(runtime, config))]
pub(crate) async fn load_configured_catalogs<R: Runtime + 'static>(
    runtime: &Arc<R>,
    config: &Config,
) -> Result<Vec<RepositoryCatalog>> {
    if config.catalogs.is_empty() {
        bail!("No package lists configured. Pass --catalog <PATH> or set APM_CATALOGS.");
    }

    let loads = load_catalogs(Arc::clone(runtime), &config.catalogs).await;
    let catalogs: Vec<RepositoryCatalog> = loads
        .into_iter()
        .filter_map(|load| match load.result {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                eprintln!("Warning: skipping package list {}: {:#}", load.source.source, e);
                None
            }
        })
        .collect();
    debug!("{} catalog(s) usable", catalogs.len());
    Ok(catalogs)
}

/// Find `id` in the catalogs, narrowed to one repository if `repository` is given.
pub(crate) fn find_package<'a>(
    catalogs: &'a [RepositoryCatalog],
    id: &str,
    repository: Option<&str>,
) -> Result<(&'a RepositoryCatalog, &'a PackageRecord)> {
    let matches: Vec<(&RepositoryCatalog, &PackageRecord)> = catalogs
        .iter()
        .filter(|c| repository.is_none_or(|r| c.source() == r))
        .filter_map(|c| c.get(id).map(|p| (c, p)))
        .collect();

    match matches.as_slice() {
        [] => match repository {
            Some(r) => bail!("Package {} not found in {}.", id, r),
            None => bail!("Package {} not found.", id),
        },
        [found] => Ok(*found),
        several => bail!(
            "Package {} is provided by several repositories; choose one with --repo:\n{}",
            id,
            several
                .iter()
                .map(|(c, _)| format!("  {}", c.source()))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    }
}
