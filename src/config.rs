//! Local directory layout (`~/.gdrive/config.yaml`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DriveError, Result};
use crate::settings::base_dir;

pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const DEFAULT_ROOT_NAME: &str = "google-drive";
pub const DEFAULT_DOWNLOADS: &str = "downloads";

pub fn default_config_path() -> Result<PathBuf> {
    Ok(base_dir()?.join(CONFIG_FILE_NAME))
}

/// Where downloaded content lands on the local machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Local root directory for drive content.
    pub root: PathBuf,
    /// Name of the downloads directory inside `root`.
    pub downloads: String,
}

impl Config {
    /// `~/google-drive` with a `downloads` directory.
    pub fn default_layout() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| DriveError::Config("cannot determine the home directory".to_string()))?;
        Ok(Self {
            root: home.join(DEFAULT_ROOT_NAME),
            downloads: DEFAULT_DOWNLOADS.to_string(),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DriveError::Config(format!(
                "cannot read {} ({}); configure the CLI with gdrive-config",
                path.display(),
                e
            ))
        })?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| DriveError::Config(format!("invalid {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.join(&self.downloads)
    }

    /// Create the root and downloads directories.
    ///
    /// Fails when either already exists so that a reconfiguration never
    /// silently adopts an unrelated directory.
    pub fn create_directories(&self) -> Result<Vec<PathBuf>> {
        let paths = vec![self.root.clone(), self.download_dir()];
        for path in &paths {
            if path.exists() {
                return Err(DriveError::Config(format!(
                    "{} already exists; choose another directory or delete it",
                    path.display()
                )));
            }
            fs::create_dir_all(path).map_err(|e| {
                DriveError::Config(format!("cannot create {}: {}", path.display(), e))
            })?;
        }
        Ok(paths)
    }
}
