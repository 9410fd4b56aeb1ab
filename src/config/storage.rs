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
use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_SOUNDS_DIR: &str = "sounds";

/// Where sounds and the saved board live. Relative paths are resolved against the
/// directory holding the configuration file.
#[derive(Deserialize, Clone, Debug)]
pub struct Storage {
    /// The directory stored sound bytes are kept in.
    #[serde(default = "default_sounds")]
    sounds: PathBuf,

    /// The file the board is saved to. When unset the board isn't saved.
    session: Option<PathBuf>,
}

fn default_sounds() -> PathBuf {
    PathBuf::from(DEFAULT_SOUNDS_DIR)
}

impl Default for Storage {
    fn default() -> Self {
        Storage {
            sounds: default_sounds(),
            session: None,
        }
    }
}

impl Storage {
    pub fn sounds(&self) -> &PathBuf {
        &self.sounds
    }

    pub fn session(&self) -> Option<&PathBuf> {
        self.session.as_ref()
    }
}
