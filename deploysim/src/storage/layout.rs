//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::SimError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Storage layout for the simulator
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the persisted deployment collection
    pub fn deployments_file(&self) -> File {
        self.data_dir().file("deployments.json")
    }

    /// Get the data directory
    pub fn data_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("data"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), SimError> {
        self.data_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os("DEPLOYSIM_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".deploysim"));
        Self::new(base_dir)
    }
}
