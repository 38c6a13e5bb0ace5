//! Config and globals persistence
//!
//! Both files are JSON. Writes go through a temp file followed by a rename so
//! a crash never leaves a half-written file behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::EngineConfig;
use super::error::{StorageError, StorageResult};
use super::globals::MemoryGlobals;

/// Write data atomically to a file
///
/// Creates a temporary file, writes the data, syncs, then renames
pub fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|err| StorageError::AtomicWriteFailed {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })
}

/// Load an [`EngineConfig`]; fields missing from the file take their defaults.
pub fn load_config(path: &Path) -> StorageResult<EngineConfig> {
    if !path.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Persist an [`EngineConfig`] as pretty-printed JSON.
pub fn write_config(path: &Path, config: &EngineConfig) -> StorageResult<()> {
    let data = serde_json::to_vec_pretty(config)?;
    write_atomic(path, &data)
}

/// Replace the contents of `globals` with the snapshot stored at `path`.
pub fn load_globals(path: &Path, globals: &MemoryGlobals) -> StorageResult<()> {
    if !path.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }
    let data = fs::read(path)?;
    let json: serde_json::Value = serde_json::from_slice(&data)?;
    globals
        .load_json(json)
        .map_err(|err| StorageError::InvalidSnapshot(err.to_string()))
}

/// Snapshot `globals` to `path`.
pub fn save_globals(path: &Path, globals: &MemoryGlobals) -> StorageResult<()> {
    let data = serde_json::to_vec_pretty(&globals.to_json())?;
    write_atomic(path, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Value;
    use crate::runtime::globals::GlobalStore;
    use tempfile::TempDir;

    #[test]
    fn config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = EngineConfig {
            max_steps: 42,
            ..EngineConfig::default()
        };
        write_config(&path, &config).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded.max_steps, 42);
        assert_eq!(loaded.max_depth, config.max_depth);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{ "max_depth": 12 }"#).unwrap();
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded.max_depth, 12);
        assert_eq!(loaded.max_steps, EngineConfig::default().max_steps);
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StorageError::PathNotFound(_)));
    }

    #[test]
    fn snapshot_errors_keep_their_storage_kind() {
        let dir = TempDir::new().unwrap();
        let globals = MemoryGlobals::new();
        let missing = load_globals(&dir.path().join("nope.json"), &globals).unwrap_err();
        assert!(matches!(missing, StorageError::PathNotFound(ref path) if path.ends_with("nope.json")));

        let path = dir.path().join("globals.json");
        fs::write(&path, b"[1, 2]").unwrap();
        let err = load_globals(&path, &globals).unwrap_err();
        assert!(matches!(err, StorageError::InvalidSnapshot(_)));

        let err = anyhow::Error::from(err).context("loading globals");
        assert!(err.downcast_ref::<StorageError>().is_some());
    }

    #[test]
    fn globals_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("globals.json");
        let globals = MemoryGlobals::new();
        globals.put("counter", Value::Int(7));
        save_globals(&path, &globals).expect("save");

        let restored = MemoryGlobals::new();
        load_globals(&path, &restored).expect("load");
        assert_eq!(restored.get("counter"), Some(Value::Int(7)));
    }
}
