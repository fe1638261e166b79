use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The directory holding a vector database.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Use `path` as the database directory, creating it if needed.
    pub fn resolve(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|_| Error::DataDir(path.to_path_buf()))?;

        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_db(&self) -> PathBuf {
        self.root.join("vecsearch.redb")
    }
}
