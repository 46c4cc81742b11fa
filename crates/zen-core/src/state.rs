//! Draft snapshots persisted on disk.
//!
//! A state file only pins the draft `id` across runs. Loading always
//! re-fetches the draft; the stored metadata is never trusted.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::InvalidInputError;
use crate::types::RecordId;
use crate::Result;

/// Write any snapshot as pretty JSON, creating parent directories.
pub fn write_snapshot<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read the draft id from a state file.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn read_draft_id(path: &Path) -> Result<Option<RecordId>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let invalid = |reason: &str| InvalidInputError::StateFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| invalid(&e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(invalid("expected a JSON object").into());
    };
    let id = map.get("id").ok_or_else(|| invalid("no `id` entry"))?;
    let id: RecordId =
        serde_json::from_value(id.clone()).map_err(|e| invalid(&e.to_string()))?;
    Ok(Some(id))
}
