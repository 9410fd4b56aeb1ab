// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, File};
use serde::Deserialize;
use tracing::{info, warn};

use crate::audio::{get_device, mixer::AudioMixer, Device, OutputHandle};
use crate::engine::{timers::SystemClock, PlaybackEngine};
use crate::i18n::{TranslationProvider, Translations};
use crate::session::{JsonFileAdapter, PersistenceAdapter};
use crate::soundboard::Soundboard;
use crate::store::FileStore;

mod audio;
mod board;
mod error;
mod storage;

pub use self::audio::Audio;
pub use self::board::Board;
pub use self::error::ConfigError;
pub use self::storage::Storage;

/// The configuration file for a soundboard.
#[derive(Deserialize, Clone, Debug)]
pub struct BoardConfig {
    /// The audio output.
    #[serde(default)]
    audio: Audio,

    /// The board layout and starting settings.
    #[serde(default)]
    board: Board,

    /// Where sounds and the saved board are kept.
    #[serde(default)]
    storage: Storage,

    /// Optional file of user-facing string overrides.
    translations: Option<PathBuf>,

    /// The directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl BoardConfig {
    /// Parse a board configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<BoardConfig, ConfigError> {
        let mut config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<BoardConfig>()?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The directory stored sounds live in.
    pub fn sounds_dir(&self) -> PathBuf {
        self.base_dir.join(self.storage.sounds())
    }

    /// The file the board is saved to, if saving is enabled.
    pub fn session_path(&self) -> Option<PathBuf> {
        self.storage.session().map(|session| self.base_dir.join(session))
    }

    /// The translations override file, if any.
    pub fn translations_path(&self) -> Option<PathBuf> {
        self.translations
            .as_ref()
            .map(|translations| self.base_dir.join(translations))
    }

    /// Loads the translations, falling back to the built-in strings if the override
    /// file can't be read.
    fn translations(&self) -> Box<dyn TranslationProvider> {
        match self.translations_path() {
            Some(path) => match Translations::load(&path) {
                Ok(translations) => Box::new(translations),
                Err(e) => {
                    warn!(err = %e, path = %path.display(), "Unable to load translations, using defaults");
                    Box::new(Translations::default())
                }
            },
            None => Box::new(Translations::default()),
        }
    }
}

/// Builds a soundboard rendering into the given mixer and restores the saved board.
pub fn init_soundboard(
    config: &BoardConfig,
    mixer: Arc<AudioMixer>,
) -> Result<Soundboard, Box<dyn Error>> {
    let keys = config.board().keys()?;
    let settings = config.board().settings()?;
    let store = FileStore::new(&config.sounds_dir(), mixer.sample_rate())?;
    let persistence = config.session_path().map(|path| {
        let adapter: Box<dyn PersistenceAdapter> = Box::new(JsonFileAdapter::new(&path));
        adapter
    });

    let engine = PlaybackEngine::new(
        keys,
        Box::new(store),
        mixer,
        Arc::new(SystemClock::new()),
    );
    let mut soundboard = Soundboard::new(engine, settings, config.translations(), persistence);
    if soundboard.restore() {
        info!("Restored saved board");
    }
    Ok(soundboard)
}

/// Initializes the soundboard and controller from the given config file and returns the
/// controller. The controller owns the soundboard and the running audio output.
pub fn init_soundboard_and_controller(
    path: &Path,
) -> Result<crate::controller::Controller, Box<dyn Error>> {
    let config = BoardConfig::deserialize(path)?;
    let device = get_device(config.audio())?;
    let mixer = Arc::new(AudioMixer::new(device.channels(), device.sample_rate()));
    let soundboard = init_soundboard(&config, mixer.clone())?;
    let output: OutputHandle = device.start(mixer)?;
    info!(device = %device, "Audio output started");

    let driver = Arc::new(crate::controller::keyboard::Driver::new());
    crate::controller::Controller::new(soundboard, output, driver)
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_deserialize_full() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("board.yaml");
        fs::write(
            &path,
            r#"
audio:
  device: mock-device
  sample_rate: 8000
  channels: 1
board:
  keys: "asdf"
  reassignable_keys: true
  fade_in: 10ms
  fade_out: 250ms
  play_multiple: true
  autokill: false
  master_volume: 0.5
storage:
  sounds: stored
  session: session.json
translations: strings.yaml
"#,
        )?;

        let config = BoardConfig::deserialize(&path)?;
        assert_eq!(config.audio().device(), "mock-device");
        assert_eq!(config.audio().sample_rate(), 8000);
        assert_eq!(config.audio().channels(), 1);
        assert_eq!(config.board().keys()?, vec!['a', 's', 'd', 'f']);

        let settings = config.board().settings()?;
        assert_eq!(settings.fade_in, Duration::from_millis(10));
        assert_eq!(settings.fade_out, Duration::from_millis(250));
        assert!(settings.play_multiple);
        assert!(settings.reassignable_keys);
        assert_eq!(settings.master_volume, 0.5);

        assert_eq!(config.sounds_dir(), dir.path().join("stored"));
        assert_eq!(config.session_path(), Some(dir.path().join("session.json")));
        assert_eq!(
            config.translations_path(),
            Some(dir.path().join("strings.yaml"))
        );
        Ok(())
    }

    #[test]
    fn test_deserialize_defaults() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("board.yaml");
        fs::write(&path, "audio:\n  device: mock-device\n")?;

        let config = BoardConfig::deserialize(&path)?;
        assert_eq!(config.audio().sample_rate(), 48000);
        assert_eq!(config.audio().channels(), 2);
        assert_eq!(config.board().keys()?.len(), 36);
        assert_eq!(config.board().settings()?, crate::soundboard::Settings::default());
        assert_eq!(config.sounds_dir(), dir.path().join("sounds"));
        assert_eq!(config.session_path(), None);
        assert_eq!(config.translations_path(), None);
        Ok(())
    }

    #[test]
    fn test_invalid_board() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("board.yaml");

        fs::write(&path, "board:\n  keys: \"aba\"\n")?;
        let config = BoardConfig::deserialize(&path)?;
        assert!(matches!(config.board().keys(), Err(ConfigError::InvalidKeys(_))));

        fs::write(&path, "board:\n  keys: \"\"\n")?;
        let config = BoardConfig::deserialize(&path)?;
        assert!(matches!(config.board().keys(), Err(ConfigError::InvalidKeys(_))));

        fs::write(&path, "board:\n  fade_out: soon\n")?;
        let config = BoardConfig::deserialize(&path)?;
        assert!(matches!(
            config.board().settings(),
            Err(ConfigError::InvalidDuration { field: "fade_out", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_init_soundboard_restores_session() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("board.yaml");
        fs::write(
            &path,
            "board:\n  keys: \"qw\"\nstorage:\n  session: session.json\n",
        )?;
        let config = BoardConfig::deserialize(&path)?;
        let mixer = Arc::new(AudioMixer::new(1, crate::testutil::TEST_SAMPLE_RATE));

        let mut soundboard = init_soundboard(&config, mixer.clone())?;
        assert!(soundboard.load_sound(
            Some(1),
            "tone",
            crate::testutil::wav_bytes(800, crate::testutil::TEST_SAMPLE_RATE, 1)
        ));
        assert!(dir.path().join("session.json").exists());
        drop(soundboard);

        let mut restored = init_soundboard(&config, mixer)?;
        assert_eq!(
            restored.engine().cells().get(1).map(|cell| cell.name.clone()),
            Some("tone".to_string())
        );
        assert!(restored.preload().is_empty());
        assert!(restored.play_key('w'));
        Ok(())
    }
}
