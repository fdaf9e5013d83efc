//! On-disk chunk persistence.
//!
//! Every chunk lives in its own JSON file, `<save>/chunks/<key>.json`. A
//! missing file means the chunk was never generated.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use hinterland_common::ChunkKey;
use tracing::{debug, warn};

use crate::chunk::ChunkResult;
use crate::record::ChunkRecord;

const EXTENSION: &str = "json";

/// Reads and writes chunk records for one save.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    /// Directory holding the chunk files
    dir: PathBuf,
}

impl ChunkStore {
    /// Creates a store rooted at `<save_dir>/chunks`. Nothing is touched on disk yet.
    #[must_use]
    pub fn new(save_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: save_dir.as_ref().join("chunks"),
        }
    }

    /// Returns the chunk directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path for a chunk.
    #[must_use]
    pub fn path(&self, key: ChunkKey) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    /// Whether a record exists for the key.
    #[must_use]
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.path(key).is_file()
    }

    /// Loads a record; `Ok(None)` when the chunk was never saved.
    pub fn load(&self, key: ChunkKey) -> ChunkResult<Option<ChunkRecord>> {
        let bytes = match fs::read(self.path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_json::from_slice(&bytes)?;
        Ok(Some(record))
    }

    /// Saves a record, replacing any previous file atomically.
    pub fn save(&self, record: &ChunkRecord) -> ChunkResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(record.id);
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));

        let json = serde_json::to_vec(record)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(key = %record.id, bytes = json.len(), "Saved chunk");
        Ok(())
    }

    /// Deletes a chunk file. Returns whether one existed.
    pub fn remove(&self, key: ChunkKey) -> ChunkResult<bool> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the keys of every saved chunk.
    ///
    /// Files whose names are not chunk keys are skipped with a warning.
    pub fn keys(&self) -> ChunkResult<Vec<ChunkKey>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match stem.parse::<ChunkKey>() {
                Ok(key) => keys.push(key),
                Err(e) => warn!(path = %path.display(), "Skipping chunk file: {e}"),
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}
