use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::QualityMetrics;
use crate::core::types::Record;

/// On-disk image of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub records: Vec<Record>,
    pub metrics: QualityMetrics,
    pub last_saved: DateTime<Utc>,
}

impl PersistedState {
    pub fn new(records: Vec<Record>, metrics: QualityMetrics) -> Self {
        PersistedState {
            records,
            metrics,
            last_saved: Utc::now(),
        }
    }

    /// Read a snapshot file. `Ok(None)` means no file exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::new(
                    ErrorKind::LoadFailure,
                    format!("cannot read {:?}: {}", path, e),
                ));
            }
        };

        let state = serde_json::from_slice(&data).map_err(|e| {
            Error::new(
                ErrorKind::LoadFailure,
                format!("malformed snapshot {:?}: {}", path, e),
            )
        })?;
        Ok(Some(state))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
