//! Durable state files with crash-safe writes.
//!
//! Every state artifact is a JSON envelope `{ generation, data }`:
//! - writes go to a temporary file in the same directory and are
//!   renamed over the target, so a crash never yields a partially
//!   written file
//! - the generation stamp detects a concurrent writer: if the on-disk
//!   generation no longer matches the one this handle loaded, `save`
//!   fails fast with [`HeraldError::StaleState`] instead of silently
//!   clobbering foreign state
//! - a missing or malformed file loads as `T::default()` (first-run
//!   semantics), never as an error

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::error::{HeraldError, Result};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    generation: u64,
    data: T,
}

#[derive(Debug, Serialize)]
struct EnvelopeRef<'a, T> {
    generation: u64,
    data: &'a T,
}

/// Handle for one durable state artifact.
///
/// A volatile handle (no path) accepts saves without touching disk;
/// used by dry-run wiring and unit tests.
#[derive(Debug)]
pub struct StateFile<T> {
    path: Option<PathBuf>,
    generation: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned + Default> StateFile<T> {
    /// Load the artifact at `path`, returning the data and a handle
    /// pinned to the generation that was read.
    pub fn load(path: impl Into<PathBuf>) -> (T, Self) {
        let path = path.into();
        let (data, generation) = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Envelope<T>>(&bytes) {
                Ok(envelope) => (envelope.data, envelope.generation),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "malformed state file; starting from empty state"
                    );
                    (T::default(), 0)
                }
            },
            Err(_) => (T::default(), 0),
        };
        (
            data,
            Self {
                path: Some(path),
                generation,
                _marker: PhantomData,
            },
        )
    }

    /// In-memory handle: saves succeed but persist nothing.
    pub fn volatile() -> (T, Self) {
        (
            T::default(),
            Self {
                path: None,
                generation: 0,
                _marker: PhantomData,
            },
        )
    }

    pub fn is_durable(&self) -> bool {
        self.path.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Atomically replace the artifact with `data`.
    pub fn save(&mut self, data: &T) -> Result<()> {
        let Some(path) = self.path.clone() else {
            self.generation += 1;
            return Ok(());
        };

        self.check_generation(&path)?;

        let envelope = EnvelopeRef {
            generation: self.generation + 1,
            data,
        };
        let json = serde_json::to_vec_pretty(&envelope)?;

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|source| HeraldError::Persistence {
                path: path.clone(),
                source,
            })?;
        }

        // Atomic write: write to temp file then rename.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(|source| HeraldError::Persistence {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| HeraldError::Persistence {
            path: path.clone(),
            source,
        })?;

        self.generation += 1;
        Ok(())
    }

    /// Fail fast if another writer bumped the on-disk generation since
    /// this handle loaded. A vanished file is not a conflict; the save
    /// simply recreates it.
    fn check_generation(&self, path: &Path) -> Result<()> {
        let Ok(bytes) = fs::read(path) else {
            return Ok(());
        };
        let Ok(envelope) = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes) else {
            return Ok(());
        };
        if envelope.generation != self.generation {
            return Err(HeraldError::StaleState {
                path: path.to_path_buf(),
                expected: self.generation,
                found: envelope.generation,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    type Data = BTreeMap<String, u32>;

    #[test]
    fn missing_file_loads_as_default() {
        let dir = TempDir::new().unwrap();
        let (data, file) = StateFile::<Data>::load(dir.path().join("state.json"));
        assert!(data.is_empty());
        assert_eq!(file.generation(), 0);
    }

    #[test]
    fn malformed_file_loads_as_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json").unwrap();

        let (data, file) = StateFile::<Data>::load(&path);
        assert!(data.is_empty());
        assert_eq!(file.generation(), 0);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let (mut data, mut file) = StateFile::<Data>::load(&path);
        data.insert("a".to_string(), 1);
        file.save(&data).unwrap();
        data.insert("b".to_string(), 2);
        file.save(&data).unwrap();

        let (reloaded, handle) = StateFile::<Data>::load(&path);
        assert_eq!(reloaded, data);
        assert_eq!(handle.generation(), 2);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let (mut data, mut file) = StateFile::<Data>::load(&path);
        data.insert("a".to_string(), 1);
        file.save(&data).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("state.json")]);
    }

    #[test]
    fn concurrent_writer_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let (mut data, mut file) = StateFile::<Data>::load(&path);
        data.insert("a".to_string(), 1);
        file.save(&data).unwrap();

        // A second handle writes in between.
        let (mut other_data, mut other) = StateFile::<Data>::load(&path);
        other_data.insert("b".to_string(), 2);
        other.save(&other_data).unwrap();

        let err = file.save(&data).unwrap_err();
        assert!(matches!(err, HeraldError::StaleState { .. }));
    }

    #[test]
    fn volatile_handle_never_touches_disk() {
        let (mut data, mut file) = StateFile::<Data>::volatile();
        data.insert("a".to_string(), 1);
        file.save(&data).unwrap();
        assert!(!file.is_durable());
        assert_eq!(file.generation(), 1);
    }
}
