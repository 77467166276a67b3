//! Package metadata parsed from repository descriptions.
//!
//! A repository publishes an XML list of packages (`<plugins>`, `<scripts>`
//! or `<packages>`); each list becomes one [`RepositoryCatalog`] of immutable
//! [`PackageRecord`]s.

mod load;
mod model;
mod parse;

pub use load::{CatalogLoad, CatalogSource, load_catalogs};
pub use model::{Category, PackageFileEntry, PackageRecord, RepositoryCatalog};
