use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// File name used when no database path is given
pub const DEFAULT_DB_FILE: &str = "matches.sqlite";

/// Where the database lives when the caller doesn't say
pub struct DataDir {
    data_dir: PathBuf,
}

impl DataDir {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "match-schema")
                    .context("Could not determine data directory")?;
                proj_dirs.data_dir().to_path_buf()
            }
        };

        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        Ok(Self { data_dir })
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to the default database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_DB_FILE)
    }
}

/// An explicit path wins; otherwise the default file in the data directory
pub fn resolve_database_path(db: Option<PathBuf>) -> Result<PathBuf> {
    match db {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            Ok(path)
        }
        None => Ok(DataDir::new(None)?.database_path()),
    }
}
