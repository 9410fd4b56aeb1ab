// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Storage for the raw bytes of loaded sounds.
//!
//! Each loaded sound is stored once under an opaque id. The id is replaced
//! wholesale when a cell is reloaded and removed when the cell is cleared.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::audio::decode::{decode_audio, DecodeError, DecodedBuffer};

/// Error types for sound storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No stored sound with id {0}")]
    NotFound(String),

    #[error("Invalid sound id: {0}")]
    InvalidId(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Persists raw audio bytes by id and decodes them into playable buffers.
pub trait AudioBufferStore: Send {
    /// The sample rate decoded buffers are produced at.
    fn sample_rate(&self) -> u32;

    /// Decodes raw bytes into a buffer at the store's sample rate.
    fn decode(&self, bytes: Vec<u8>) -> Result<DecodedBuffer, StoreError> {
        Ok(decode_audio(bytes, self.sample_rate())?)
    }

    /// Stores bytes under the given id, replacing anything already there.
    fn persist(&mut self, id: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Returns the bytes stored under the given id.
    fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Removes the bytes stored under the given id. Missing ids are not an error.
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    /// Removes every stored sound.
    fn clear_all(&mut self) -> Result<(), StoreError>;
}

/// Ids become file names, so only a conservative character set is accepted.
fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

/// Stores one file per sound in a directory.
pub struct FileStore {
    directory: PathBuf,
    sample_rate: u32,
}

const EXTENSION: &str = "snd";

impl FileStore {
    /// Opens (and creates if needed) a store rooted at the given directory.
    pub fn new(directory: &Path, sample_rate: u32) -> Result<FileStore, StoreError> {
        fs::create_dir_all(directory)?;
        info!(directory = %directory.display(), "Opened sound store");
        Ok(FileStore {
            directory: directory.to_path_buf(),
            sample_rate,
        })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.directory.join(id).with_extension(EXTENSION))
    }
}

impl AudioBufferStore for FileStore {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn persist(&mut self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        fs::write(&path, bytes)?;
        debug!(id, bytes = bytes.len(), "Persisted sound");
        Ok(())
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id, "Deleted sound");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                fs::remove_file(&path)?;
            }
        }
        info!(directory = %self.directory.display(), "Cleared sound store");
        Ok(())
    }
}

/// Keeps stored sounds in memory. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    sounds: HashMap<String, Vec<u8>>,
    sample_rate: u32,
}

impl MemoryStore {
    pub fn new(sample_rate: u32) -> MemoryStore {
        MemoryStore {
            sounds: HashMap::new(),
            sample_rate,
        }
    }

    /// Returns the number of stored sounds.
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Returns true if a sound is stored under the given id.
    pub fn contains(&self, id: &str) -> bool {
        self.sounds.contains_key(id)
    }
}

impl AudioBufferStore for MemoryStore {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn persist(&mut self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_id(id)?;
        self.sounds.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.sounds
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.sounds.remove(id);
        Ok(())
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        self.sounds.clear();
        Ok(())
    }
}
