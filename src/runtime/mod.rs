//! Runtime abstraction for system operations.
//!
//! Configuration loading and the data helpers go through this trait so
//! they can be exercised against a mock instead of the real environment.
//!
//! # Structure
//!
//! - `env` - Environment variables and well-known directories
//! - `fs` - File system operations (read, write, append, directory)

mod env;
mod fs;

use anyhow::Result;
use std::fs::File;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_vars(&self) -> Vec<(String, String)>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn open_append(&self, path: &Path) -> Result<File>;

    // Directories
    fn config_dir(&self) -> Option<PathBuf>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_vars(&self) -> Vec<(String, String)> {
        self.env_vars_impl()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn open_append(&self, path: &Path) -> Result<File> {
        self.open_append_impl(path)
    }

    fn config_dir(&self) -> Option<PathBuf> {
        self.config_dir_impl()
    }
}

/// Creates the parent directory of `path` if it has one.
pub(crate) fn ensure_parent<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => runtime.create_dir_all(parent),
        _ => Ok(()),
    }
}
