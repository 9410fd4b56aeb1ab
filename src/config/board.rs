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
use std::collections::HashSet;
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::soundboard::Settings;

const DEFAULT_KEYS: &str = "1234567890qwertyuiopasdfghjklzxcvbnm";

/// The board layout and the settings it starts with.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Board {
    /// One character per cell, in cell order.
    keys: String,

    /// Whether cells may be given keys other than their layout key.
    reassignable_keys: bool,

    /// Fade applied when a sound starts.
    fade_in: Option<String>,

    /// Fade applied when a sound is stopped.
    fade_out: Option<String>,

    /// Whether a cell can play over itself.
    play_multiple: bool,

    /// Whether starting a sound fades out the previously triggered cell.
    autokill: bool,

    /// Master volume between 0 and 1.
    master_volume: f32,
}

impl Default for Board {
    fn default() -> Self {
        Board {
            keys: DEFAULT_KEYS.to_string(),
            reassignable_keys: false,
            fade_in: None,
            fade_out: None,
            play_multiple: false,
            autokill: false,
            master_volume: 1.0,
        }
    }
}

impl Board {
    /// Returns the key layout. Keys must be unique, printable and there must be at
    /// least one.
    pub fn keys(&self) -> Result<Vec<char>, ConfigError> {
        let keys: Vec<char> = self.keys.chars().collect();
        if keys.is_empty() {
            return Err(ConfigError::InvalidKeys("no keys configured".into()));
        }

        let mut seen = HashSet::new();
        for key in keys.iter() {
            if key.is_whitespace() || key.is_control() {
                return Err(ConfigError::InvalidKeys(format!(
                    "{:?} can't be used as a key",
                    key
                )));
            }
            if !seen.insert(*key) {
                return Err(ConfigError::InvalidKeys(format!(
                    "{} is used more than once",
                    key
                )));
            }
        }
        Ok(keys)
    }

    /// Returns the settings the board starts with.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            master_volume: if self.master_volume.is_nan() {
                0.0
            } else {
                self.master_volume.clamp(0.0, 1.0)
            },
            fade_in: parse_duration("fade_in", &self.fade_in)?,
            fade_out: parse_duration("fade_out", &self.fade_out)?,
            play_multiple: self.play_multiple,
            autokill: self.autokill,
            reassignable_keys: self.reassignable_keys,
        })
    }
}

fn parse_duration(field: &'static str, value: &Option<String>) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Duration::from)
            .map_err(|_| ConfigError::InvalidDuration {
                field,
                value: value.clone(),
            }),
        None => Ok(Duration::ZERO),
    }
}
