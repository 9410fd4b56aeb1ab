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

//! Saved board state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid session file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single cell as saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellSnapshot {
    pub name: String,
    pub key: Option<char>,
    pub color: String,
    pub is_looping: bool,
    pub is_cued: bool,
    pub buffer_id: Option<String>,
}

/// Everything needed to rebuild a board. Fades are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub cells: Vec<CellSnapshot>,
    pub master_volume: f32,
    pub fade_in: f64,
    pub fade_out: f64,
    pub play_multiple: bool,
    pub autokill: bool,
    pub cue_queue: Vec<usize>,
    pub cue_cursor: Option<usize>,
    pub last_played_index: Option<usize>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            master_volume: 1.0,
            fade_in: 0.0,
            fade_out: 0.0,
            play_multiple: false,
            autokill: false,
            cue_queue: Vec::new(),
            cue_cursor: None,
            last_played_index: None,
        }
    }
}

/// Loads and saves snapshots.
pub trait PersistenceAdapter: Send {
    /// Returns the saved snapshot, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot>, SessionError>;

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SessionError>;
}

/// Saves snapshots as a JSON file.
pub struct JsonFileAdapter {
    path: PathBuf,
}

impl JsonFileAdapter {
    pub fn new(path: &Path) -> JsonFileAdapter {
        JsonFileAdapter {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceAdapter for JsonFileAdapter {
    fn load(&self) -> Result<Option<Snapshot>, SessionError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Written beside the target and renamed so a crash never leaves half a file.
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), "Saved session");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_file_loads_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let adapter = JsonFileAdapter::new(&dir.path().join("session.json"));
        assert!(adapter.load()?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut adapter = JsonFileAdapter::new(&dir.path().join("nested").join("session.json"));
        let snapshot = Snapshot {
            cells: vec![CellSnapshot {
                name: "Door slam".into(),
                key: Some('q'),
                color: "#4363d8".into(),
                is_looping: true,
                is_cued: false,
                buffer_id: Some("sound-00000000000000ff".into()),
            }],
            master_volume: 0.5,
            fade_out: 0.25,
            cue_cursor: Some(0),
            ..Default::default()
        };

        adapter.save(&snapshot)?;
        assert_eq!(adapter.load()?, Some(snapshot));
        Ok(())
    }

    #[test]
    fn test_camel_case_fields() -> Result<(), Box<dyn std::error::Error>> {
        let json = r##"{
            "cells": [{"name": "a", "key": "w", "color": "#000000", "isLooping": true, "isCued": true, "bufferId": "x"}],
            "masterVolume": 0.75,
            "playMultiple": true,
            "cueQueue": [0],
            "cueCursor": null,
            "lastPlayedIndex": 0
        }"##;
        let snapshot: Snapshot = serde_json::from_str(json)?;

        assert!(snapshot.cells[0].is_looping);
        assert_eq!(snapshot.cells[0].buffer_id.as_deref(), Some("x"));
        assert_eq!(snapshot.master_volume, 0.75);
        assert!(snapshot.play_multiple);
        assert!(!snapshot.autokill);
        assert_eq!(snapshot.cue_cursor, None);
        assert_eq!(snapshot.last_played_index, Some(0));
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json")?;
        assert!(matches!(
            JsonFileAdapter::new(&path).load(),
            Err(SessionError::Json(_))
        ));
        Ok(())
    }
}
