use anyhow::Result;
use log::debug;
use std::sync::Arc;

use crate::{
    catalog::{PackageFileEntry, PackageRecord},
    config::Config,
    records::RecordStore,
    reconcile::Reconciler,
    runtime::Runtime,
};

use super::{find_package, load_configured_catalogs};

/// Show detailed information about a package
#[tracing::instrument(skip(runtime, config))]
pub async fn show<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: Config,
    id: &str,
    repository: Option<&str>,
) -> Result<()> {
    debug!("Showing info for {}", id);
    let catalogs = load_configured_catalogs(&runtime, &config).await?;
    let (catalog, package) = find_package(&catalogs, id, repository)?;

    let installed = RecordStore::new(runtime.as_ref(), &config.install_root).load()?;
    let reconciler = Reconciler::scan(runtime.as_ref(), &config.install_root, &installed, &catalogs)?;
    let status = reconciler.status(package, catalog.source());

    println!("Package: {}", package.display_name());
    println!("Id: {}", package.id());
    println!("Repository: {}", catalog.source());
    println!("Status: {}", status);
    if let Some(latest) = package.latest_version() {
        println!("Latest version: {}", latest);
    }
    print_details(package);

    println!("\nFiles:");
    if package.files().is_empty() {
        println!("  (none)");
    }
    for file in package.files() {
        println!("  {}", format_file_entry(file));
    }

    Ok(())
}

fn print_details(package: &PackageRecord) {
    if !package.categories().is_empty() {
        let labels: Vec<&str> = package.categories().iter().map(|c| c.label()).collect();
        println!("Type: {}", labels.join(", "));
    }
    if let Some(overview) = package.overview().filter(|s| !s.is_empty()) {
        println!("Overview: {}", overview);
    }
    if let Some(description) = package.description().filter(|s| !s.is_empty()) {
        println!("\nDescription: {}", description);
    }

    let links = [
        ("Homepage", package.page_url()),
        ("Download", package.download_url()),
        ("Mirror", package.download_mirror_url()),
        ("Details", package.detail_url()),
    ];
    for (label, url) in links {
        if let Some(url) = url.filter(|s| !s.is_empty()) {
            println!("{}: {}", label, url);
        }
    }

    if let Some(installer) = package.installer() {
        match package.install_arg() {
            Some(arg) if !arg.is_empty() => println!("Installer: {} {}", installer, arg),
            _ => println!("Installer: {}", installer),
        }
    }
}

pub(crate) fn format_file_entry(file: &PackageFileEntry) -> String {
    let mut flags = Vec::new();
    if file.is_directory() {
        flags.push("directory".to_string());
    }
    if file.is_optional() {
        flags.push("optional".to_string());
    }
    if file.is_uninstall_only() {
        flags.push("uninstall only".to_string());
    }
    if file.is_obsolete() {
        flags.push("obsolete".to_string());
    }
    if let Some(archive_path) = file.archive_path() {
        flags.push(format!("from {}", archive_path));
    }

    if flags.is_empty() {
        file.path().to_string()
    } else {
        format!("{} ({})", file.path(), flags.join(", "))
    }
}
