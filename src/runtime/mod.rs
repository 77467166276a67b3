//! Runtime abstraction for system operations.
//!
//! Every filesystem and environment access made by the catalog loader, the
//! scanner, the reconciler and the installer goes through [`Runtime`], so the
//! whole core can be exercised against a `MockRuntime` in tests.
//!
//! # Structure
//!
//! - `env` - Environment variables and well-known directories
//! - `fs` - File system operations (read, write, copy, remove, directory)
//! - `path` - Lexical containment checks for catalog paths
//! - `user` - User interaction (confirmation prompts)

mod env;
mod fs;
mod path;
mod user;

pub use path::{is_contained_path, join_contained};

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    /// Merge-copy the directory tree at `from` onto `to`.
    ///
    /// Files that already exist at the destination are overwritten, anything
    /// else under `to` is left untouched. Returns the number of files copied.
    fn copy_tree(&self, from: &Path, to: &Path) -> Result<u64>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;

    /// List the entries of a directory.
    ///
    /// The underlying `std::io::Error` is kept as the root cause so callers
    /// can tell a missing directory apart from other failures.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    // Directories
    fn config_dir(&self) -> Option<PathBuf>;
    fn current_dir(&self) -> Result<PathBuf>;

    // User interaction
    /// Prompt user for confirmation. Returns true if user confirms (y/yes), false otherwise.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_impl(from, to)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copy_tree_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.is_file_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn config_dir(&self) -> Option<PathBuf> {
        self.config_dir_impl()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.confirm_impl(prompt)
    }
}
