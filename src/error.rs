//! Error taxonomy for catalog loading, scanning and file placement.
//!
//! Operations return `anyhow::Result`; when one of these conditions is the
//! cause, the [`ApmError`] is the root of the chain and can be recovered with
//! `err.downcast_ref::<ApmError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApmError {
    /// The repository description is malformed or does not have the expected shape.
    #[error("Failed to parse the package list from {repository}: {message}")]
    CatalogParse { repository: String, message: String },

    /// A directory could not be read while scanning the installation root.
    #[error("Failed to read {path:?}: {message}")]
    FilesystemRead { path: PathBuf, message: String },

    /// A copy or delete failed while placing or removing package files.
    #[error("Failed to install or remove {path:?}: {message}")]
    InstallCopy { path: PathBuf, message: String },

    /// Files were copied but the result could not be verified.
    #[error("Could not verify that the files were installed; missing: {}", .missing.join(", "))]
    InstallVerification { missing: Vec<String> },

    /// Files were removed but some of them are still present.
    #[error("Could not verify that the files were removed; remaining: {}", .remaining.join(", "))]
    UninstallVerification { remaining: Vec<String> },
}

impl ApmError {
    pub fn catalog_parse(repository: &str, message: impl Into<String>) -> Self {
        ApmError::CatalogParse {
            repository: repository.to_string(),
            message: message.into(),
        }
    }

    /// Wrap an underlying failure, keeping its full context chain in the message.
    pub fn install_copy(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        ApmError::InstallCopy {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }
}
