/// JSON snapshot loader.
///
/// A snapshot file holds both reading collections:
///
/// ```text
/// { "sump_readings": [ { "date": "2025-01-02", "site": ..., "pit": ..., ... } ],
///   "pump_readings": [ { "date": ..., "unit_code": ..., ... } ] }
/// ```
///
/// Blank numeric cells may be omitted or `null`; they are rejected per
/// record during the computation pass, not here. A reading without a date,
/// site or pit cannot be attributed to any key and fails the whole parse.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::model::ReadingSnapshot;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn parse_snapshot(json: &str) -> Result<ReadingSnapshot, SnapshotError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<ReadingSnapshot, SnapshotError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let snapshot = parse_snapshot(&contents)?;
    debug!(
        path = %path.display(),
        sump_readings = snapshot.sump_readings.len(),
        pump_readings = snapshot.pump_readings.len(),
        "loaded snapshot"
    );
    Ok(snapshot)
}
