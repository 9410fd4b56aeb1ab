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

//! User-facing strings.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, File};
use tracing::{debug, warn};

use crate::config::ConfigError;

const DEFAULTS: &[(&str, &str)] = &[
    (
        "decode_failed",
        "The sound in cell {cell} could not be decoded and has been removed.",
    ),
    (
        "storage_missing",
        "The sound for cell {cell} is no longer stored and has been removed.",
    ),
    (
        "storage_failed",
        "The sound for cell {cell} could not be read or saved and has been removed.",
    ),
    ("preload_failed", "The sound in cell {cell} could not be read."),
    ("board_full", "Every cell already holds a sound."),
    ("invalid_cell", "There is no cell {cell}."),
    ("file_unreadable", "Unable to read {name}."),
    ("session_save_failed", "The board could not be saved."),
    ("session_load_failed", "The saved board could not be loaded."),
    ("keys_locked", "Keys can't be reassigned on this board."),
];

/// Looks up user-facing strings by key.
pub trait TranslationProvider: Send {
    fn get_string(&self, key: &str) -> String;
}

/// The built-in English strings, optionally overridden from a file.
#[derive(Debug, Clone)]
pub struct Translations {
    strings: HashMap<String, String>,
}

impl Default for Translations {
    fn default() -> Self {
        Self {
            strings: DEFAULTS
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl Translations {
    /// Loads overrides from a YAML file of `key: string` pairs on top of the
    /// built-in strings.
    pub fn load(path: &Path) -> Result<Translations, ConfigError> {
        let overrides = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<HashMap<String, String>>()?;

        let mut translations = Translations::default();
        for (key, value) in overrides {
            if !translations.strings.contains_key(&key) {
                warn!(key, "Unknown translation key");
            }
            translations.strings.insert(key, value);
        }
        debug!(path = %path.display(), strings = translations.strings.len(), "Loaded translations");
        Ok(translations)
    }
}

impl TranslationProvider for Translations {
    fn get_string(&self, key: &str) -> String {
        self.strings
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

/// Substitutes `{name}` placeholders.
pub fn format(template: &str, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
}
