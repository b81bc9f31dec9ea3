use std::path::{Path, PathBuf};
use std::fs;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};

/// File locations used by the persistence manager
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub primary_path: PathBuf,  // Authoritative JSON snapshot
    pub primary_dir: PathBuf,   // Temp files are created here so rename stays on one filesystem
    pub backup_path: PathBuf,   // Best-effort copy of the primary file
}

impl StorageLayout {
    pub fn new(primary_path: PathBuf, backup_path: PathBuf) -> Result<Self> {
        if primary_path.file_name().is_none() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("storage path {:?} does not name a file", primary_path),
            ));
        }

        let primary_dir = match primary_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(StorageLayout {
            primary_path,
            primary_dir,
            backup_path,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.storage_path.clone(), config.backup_path.clone())
    }

    /// Directories are created lazily, on the first write.
    pub fn ensure_primary_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.primary_dir)?;
        Ok(())
    }

    pub fn ensure_backup_dir(&self) -> Result<()> {
        if let Some(parent) = self.backup_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    pub fn lock_path(&self) -> PathBuf {
        let name = self
            .primary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.primary_dir.join(format!(".{}.lock", name))
    }

    pub fn temp_prefix(&self) -> String {
        let name = self
            .primary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(".{}.", name)
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }
}
