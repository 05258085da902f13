//! Store locations.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{STORAGE_DIR, SYSTEM_FILE_NAME, TEMP_FILE_NAME};

/// The store directory and the well-known files inside it.
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
    system: PathBuf,
    temp: PathBuf,
}

impl StorePaths {
    /// The standard location, `$HOME/PwmStore`.
    pub fn from_home() -> Result<Self> {
        let home = env::var_os("HOME").context("HOME must be set")?;
        Ok(Self::at(Path::new(&home).join(STORAGE_DIR)))
    }

    /// A store rooted at an arbitrary directory.
    pub fn at(root: PathBuf) -> Self {
        let system = root.join(SYSTEM_FILE_NAME);
        let temp = root.join(TEMP_FILE_NAME);
        Self { root, system, temp }
    }

    /// The storage directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The system file.
    pub fn system(&self) -> &Path {
        &self.system
    }

    /// The transient file used for atomic rewrites.
    pub fn temp(&self) -> &Path {
        &self.temp
    }

    /// The path of an item file, by its derived name.
    pub fn item(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}
