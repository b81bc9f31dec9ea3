use std::path::PathBuf;
use std::time::Duration;
use crate::core::error::{Error, ErrorKind, Result};

pub const ENV_STORAGE_PATH: &str = "RELIQUARY_STORAGE_PATH";
pub const ENV_BACKUP_PATH: &str = "RELIQUARY_BACKUP_PATH";
pub const ENV_PERSIST: &str = "RELIQUARY_PERSIST";
pub const ENV_PERSIST_INTERVAL_SECS: &str = "RELIQUARY_PERSIST_INTERVAL_SECS";
pub const ENV_BACKUP_EVERY: &str = "RELIQUARY_BACKUP_EVERY";

/// Longest accepted auto-persist period (one year). Larger values cannot be
/// scheduled on a monotonic clock on every platform.
pub const MAX_PERSIST_INTERVAL_SECS: u64 = 60 * 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,          // Primary JSON file
    pub backup_path: PathBuf,           // Copy target for periodic backups
    pub persistence_enabled: bool,      // false = purely in-memory, no load, no timer
    pub persist_interval_secs: u64,     // Auto-persist period
    pub backup_every: u32,              // Backup after every Nth successful persist, 0 = never
    pub event_capacity: usize,          // Broadcast buffer for RecordStored events
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data/records.json"),
            backup_path: PathBuf::from("./data/backups/records.backup.json"),
            persistence_enabled: true,
            persist_interval_secs: 30,
            backup_every: 10,
            event_capacity: 256,
        }
    }
}

impl Config {
    /// In-memory configuration: nothing is loaded or written.
    pub fn in_memory() -> Self {
        Config {
            persistence_enabled: false,
            ..Config::default()
        }
    }

    /// Configuration rooted at `dir`, using the default file names.
    pub fn at_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Config {
            storage_path: dir.join("records.json"),
            backup_path: dir.join("backups").join("records.backup.json"),
            ..Config::default()
        }
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    /// Build a config from the process environment, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment, CLI layer, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup(ENV_STORAGE_PATH) {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_BACKUP_PATH) {
            config.backup_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup(ENV_PERSIST) {
            config.persistence_enabled = parse_flag(ENV_PERSIST, &flag)?;
        }
        if let Some(secs) = lookup(ENV_PERSIST_INTERVAL_SECS) {
            config.persist_interval_secs = parse_number(ENV_PERSIST_INTERVAL_SECS, &secs)?;
        }
        if let Some(every) = lookup(ENV_BACKUP_EVERY) {
            config.backup_every = parse_number(ENV_BACKUP_EVERY, &every)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.persistence_enabled && self.persist_interval_secs == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "persist interval must be at least one second".to_string(),
            ));
        }
        if self.persistence_enabled && self.persist_interval_secs > MAX_PERSIST_INTERVAL_SECS {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!(
                    "persist interval of {}s exceeds the maximum of {}s",
                    self.persist_interval_secs, MAX_PERSIST_INTERVAL_SECS
                ),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "event capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("{}: expected a boolean, got '{}'", key, other),
        )),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::new(
            ErrorKind::InvalidArgument,
            format!("{}: expected a number, got '{}'", key, value),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let config = config_from(&[
            (ENV_STORAGE_PATH, "/var/lib/reliquary/state.json"),
            (ENV_PERSIST, "off"),
            (ENV_PERSIST_INTERVAL_SECS, "5"),
            (ENV_BACKUP_EVERY, "3"),
        ])
        .unwrap();

        assert_eq!(config.storage_path, PathBuf::from("/var/lib/reliquary/state.json"));
        assert!(!config.persistence_enabled);
        assert_eq!(config.persist_interval(), Duration::from_secs(5));
        assert_eq!(config.backup_every, 3);
        assert_eq!(config.backup_path, Config::default().backup_path);
    }

    #[test]
    fn test_empty_lookup_is_default() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert!(config.persistence_enabled);
        assert_eq!(config.persist_interval_secs, 30);
    }

    #[test]
    fn test_bad_values_rejected() {
        let err = config_from(&[(ENV_PERSIST, "maybe")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        let err = config_from(&[(ENV_PERSIST_INTERVAL_SECS, "soon")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        let err = config_from(&[(ENV_PERSIST_INTERVAL_SECS, "0")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unschedulable_interval_rejected() {
        let err = config_from(&[(ENV_PERSIST_INTERVAL_SECS, "18446744073709551615")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        let max = MAX_PERSIST_INTERVAL_SECS.to_string();
        assert!(config_from(&[(ENV_PERSIST_INTERVAL_SECS, max.as_str())]).is_ok());

        // Irrelevant once persistence is off.
        let config = config_from(&[(ENV_PERSIST, "off"), (ENV_PERSIST_INTERVAL_SECS, "18446744073709551615")]).unwrap();
        assert!(!config.persistence_enabled);
    }
}
