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

//! The trigger surface used by controllers.
//!
//! Every call returns immediately. Failures never propagate: they are turned
//! into translated [`StatusEvent::Alert`]s and the call returns false.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::cells::CellUpdate;
use crate::cue::CueQueue;
use crate::engine::{CellError, PlayOptions, PlaybackEngine, StatusEvent};
use crate::i18n::{self, TranslationProvider};
use crate::session::{CellSnapshot, PersistenceAdapter, Snapshot};
use crate::util::sound_name;

/// User settings that shape every trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub master_volume: f32,
    pub fade_in: Duration,
    pub fade_out: Duration,
    pub play_multiple: bool,
    pub autokill: bool,
    /// Whether cells may be given keys other than the default layout.
    pub reassignable_keys: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            fade_in: Duration::ZERO,
            fade_out: Duration::ZERO,
            play_multiple: false,
            autokill: false,
            reassignable_keys: false,
        }
    }
}

pub struct Soundboard {
    engine: PlaybackEngine,
    cues: CueQueue,
    settings: Settings,
    translations: Box<dyn TranslationProvider>,
    persistence: Option<Box<dyn PersistenceAdapter>>,
}

impl fmt::Display for Soundboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.engine.cells())?;
        if !self.cues.queue().is_empty() {
            write!(f, "{}", self.cues)?;
        }
        Ok(())
    }
}

impl Soundboard {
    pub fn new(
        engine: PlaybackEngine,
        settings: Settings,
        translations: Box<dyn TranslationProvider>,
        persistence: Option<Box<dyn PersistenceAdapter>>,
    ) -> Soundboard {
        engine.mixer().set_master_volume(settings.master_volume);
        Soundboard {
            engine,
            cues: CueQueue::new(),
            settings,
            translations,
            persistence,
        }
    }

    /// Options for a direct trigger.
    fn play_options(&self) -> PlayOptions {
        PlayOptions {
            fade_in: self.settings.fade_in,
            fade_out: self.settings.fade_out,
            allow_multiple: self.settings.play_multiple,
            autokill: self.settings.autokill,
            record_last_played: true,
        }
    }

    /// Plays the cell. Empty cells are ignored.
    pub fn play(&mut self, index: usize) -> bool {
        match self.engine.play(index, self.play_options()) {
            Ok(played) => played,
            Err(e) => {
                self.cell_failed(e);
                self.persist();
                false
            }
        }
    }

    /// Plays the cell bound to the key.
    pub fn play_key(&mut self, key: char) -> bool {
        match self.engine.cells().index_for_key(key) {
            Some(index) => self.play(index),
            None => false,
        }
    }

    pub fn toggle_cue(&mut self, index: usize) -> bool {
        if !self.cues.toggle(self.engine.cells_mut(), index) {
            return false;
        }
        self.cues_changed();
        true
    }

    /// Empties the cue queue.
    pub fn uncue_all(&mut self) -> bool {
        if self.cues.queue().is_empty() {
            return false;
        }
        self.cues.remove_all(self.engine.cells_mut());
        self.cues_changed();
        true
    }

    /// Advances the cue cursor and plays the selected cell.
    pub fn go_next(&mut self) -> bool {
        let options = self.play_options();
        let outcome = self.cues.go_next(&mut self.engine, options);
        let changed = outcome.played.is_some() || !outcome.failed.is_empty();
        for error in outcome.failed {
            self.alert_cell_error(&error);
        }
        if changed {
            self.cues_changed();
        }
        outcome.played.is_some()
    }

    pub fn go_previous(&mut self) -> bool {
        if !self.cues.go_previous() {
            return false;
        }
        self.cues_changed();
        true
    }

    /// Silences everything immediately.
    pub fn stop_all(&mut self) -> bool {
        self.engine.stop_all(Duration::ZERO);
        true
    }

    pub fn fadeout_cell(&mut self, index: usize) -> bool {
        self.engine.fadeout_cell(index, self.settings.fade_out) > 0
    }

    /// Empties the cell and deletes its stored sound.
    pub fn clear_cell(&mut self, index: usize) -> bool {
        if self.cues.remove(index) {
            self.engine.push_event(StatusEvent::CuesChanged);
        }
        if !self.engine.clear_cell(index, self.settings.fade_out) {
            return false;
        }
        self.persist();
        true
    }

    /// Empties every cell and deletes every stored sound.
    pub fn clear_all(&mut self) -> bool {
        self.cues.remove_all(self.engine.cells_mut());
        self.engine.push_event(StatusEvent::CuesChanged);
        self.engine.clear_all(Duration::ZERO);
        info!("Cleared board");
        self.persist();
        true
    }

    pub fn set_loop(&mut self, index: usize, looping: bool) -> bool {
        if !self.engine.set_loop(index, looping) {
            return false;
        }
        self.persist();
        true
    }

    pub fn toggle_loop(&mut self, index: usize) -> bool {
        match self.engine.cells().get(index) {
            Some(cell) => {
                let looping = !cell.is_looping;
                self.set_loop(index, looping)
            }
            None => false,
        }
    }

    /// Sets the master volume, clamped to [0, 1]. Running sounds follow immediately.
    pub fn set_master_volume(&mut self, volume: f32) -> bool {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.settings.master_volume = volume;
        self.engine.mixer().set_master_volume(volume);
        self.persist();
        true
    }

    pub fn set_fade_in(&mut self, fade: Duration) -> bool {
        self.settings.fade_in = fade;
        self.persist();
        true
    }

    pub fn set_fade_out(&mut self, fade: Duration) -> bool {
        self.settings.fade_out = fade;
        self.persist();
        true
    }

    pub fn set_play_multiple(&mut self, play_multiple: bool) -> bool {
        self.settings.play_multiple = play_multiple;
        self.persist();
        true
    }

    pub fn set_autokill(&mut self, autokill: bool) -> bool {
        self.settings.autokill = autokill;
        self.persist();
        true
    }

    /// Loads a sound into the cell, or into the first empty cell when no index
    /// is given.
    pub fn load_sound(&mut self, index: Option<usize>, name: &str, bytes: Vec<u8>) -> bool {
        let index = match index.or_else(|| self.engine.cells().first_empty()) {
            Some(index) if index < self.engine.cells().len() => index,
            Some(index) => {
                self.alert_invalid_cell(index);
                return false;
            }
            None => {
                self.alert("board_full", &[]);
                return false;
            }
        };

        if self.cues.remove(index) {
            self.engine.push_event(StatusEvent::CuesChanged);
        }
        let loaded = match self.engine.load_sound(index, name, bytes) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.alert_cell_error(&e);
                false
            }
        };
        self.persist();
        loaded
    }

    /// Reads a file and loads it like [`Soundboard::load_sound`]. The cell is
    /// named after the file.
    pub fn load_file(&mut self, index: Option<usize>, path: &Path) -> bool {
        match fs::read(path) {
            Ok(bytes) => self.load_sound(index, sound_name(path), bytes),
            Err(e) => {
                warn!(path = %path.display(), err = %e, "Unable to read sound file");
                self.alert("file_unreadable", &[("name", &path.display().to_string())]);
                false
            }
        }
    }

    pub fn rename(&mut self, index: usize, name: &str) -> bool {
        if self.engine.cells().get(index).is_none_or(|cell| cell.is_empty()) {
            return false;
        }
        self.engine.cells_mut().set(
            index,
            CellUpdate {
                name: Some(name.to_string()),
                ..Default::default()
            },
        );
        self.engine.push_event(StatusEvent::CellChanged(index));
        self.persist();
        true
    }

    /// Gives the cell a new key, taking it from whichever cell held it.
    pub fn assign_key(&mut self, index: usize, key: char) -> bool {
        if !self.settings.reassignable_keys {
            self.alert("keys_locked", &[]);
            return false;
        }
        if index >= self.engine.cells().len() {
            self.alert_invalid_cell(index);
            return false;
        }

        let previous = self
            .engine
            .cells()
            .index_for_key(key)
            .filter(|holder| *holder != index);
        self.engine.cells_mut().set(
            index,
            CellUpdate {
                key: Some(Some(key)),
                ..Default::default()
            },
        );
        if let Some(previous) = previous {
            self.engine.push_event(StatusEvent::CellChanged(previous));
        }
        self.engine.push_event(StatusEvent::CellChanged(index));
        self.persist();
        true
    }

    /// Captures the persisted state of the board.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cells: self
                .engine
                .cells()
                .iter()
                .map(|cell| CellSnapshot {
                    name: cell.name.clone(),
                    key: cell.key,
                    color: cell.color.clone(),
                    is_looping: cell.is_looping,
                    is_cued: cell.is_cued,
                    buffer_id: cell.buffer_id().map(str::to_string),
                })
                .collect(),
            master_volume: self.settings.master_volume,
            fade_in: self.settings.fade_in.as_secs_f64(),
            fade_out: self.settings.fade_out.as_secs_f64(),
            play_multiple: self.settings.play_multiple,
            autokill: self.settings.autokill,
            cue_queue: self.cues.queue().to_vec(),
            cue_cursor: self.cues.cursor(),
            last_played_index: self.engine.last_played(),
        }
    }

    /// Replaces the whole board with the snapshot. Nothing of the current state
    /// is kept. Sounds are resolved from storage when first played.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.engine.reset();

        self.settings.fade_in = seconds(snapshot.fade_in);
        self.settings.fade_out = seconds(snapshot.fade_out);
        self.settings.play_multiple = snapshot.play_multiple;
        self.settings.autokill = snapshot.autokill;
        self.settings.master_volume = if snapshot.master_volume.is_nan() {
            0.0
        } else {
            snapshot.master_volume.clamp(0.0, 1.0)
        };
        self.engine
            .mixer()
            .set_master_volume(self.settings.master_volume);

        let restored = snapshot.cells.len().min(self.engine.cells().len());
        for (index, cell) in snapshot.cells.iter().take(restored).enumerate() {
            let Some(buffer_id) = cell.buffer_id.clone() else {
                continue;
            };
            self.engine.attach_stored(index, buffer_id);
            self.engine.cells_mut().set(
                index,
                CellUpdate {
                    name: Some(cell.name.clone()),
                    color: Some(cell.color.clone()),
                    is_looping: Some(cell.is_looping),
                    ..Default::default()
                },
            );
        }
        if self.settings.reassignable_keys {
            for (index, cell) in snapshot.cells.iter().take(restored).enumerate() {
                self.engine.cells_mut().set(
                    index,
                    CellUpdate {
                        key: Some(cell.key),
                        ..Default::default()
                    },
                );
            }
        }

        self.cues.restore(
            self.engine.cells_mut(),
            &snapshot.cue_queue,
            snapshot.cue_cursor,
        );
        self.engine.set_last_played(snapshot.last_played_index);
        self.engine.push_event(StatusEvent::CuesChanged);
        info!(
            cells = restored,
            cues = self.cues.queue().len(),
            "Applied snapshot"
        );
    }

    /// Loads the saved board, if there is one.
    pub fn restore(&mut self) -> bool {
        let Some(persistence) = &self.persistence else {
            return false;
        };
        match persistence.load() {
            Ok(Some(snapshot)) => {
                self.apply_snapshot(&snapshot);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(err = %e, "Unable to load session");
                self.alert("session_load_failed", &[]);
                false
            }
        }
    }

    /// Reads every stored sound ahead of the first trigger. Returns the cells
    /// whose sounds couldn't be resolved. Those cells keep their sounds.
    pub fn preload(&mut self) -> Vec<usize> {
        let failures = self.engine.preload_all();
        for error in &failures {
            warn!(err = %error, "Unable to preload cell");
            let cell = (error.cell() + 1).to_string();
            self.alert("preload_failed", &[("cell", &cell)]);
        }
        failures.iter().map(CellError::cell).collect()
    }

    /// Processes finished sounds and due timers.
    pub fn tick(&mut self) {
        self.engine.tick();
    }

    pub fn take_events(&mut self) -> Vec<StatusEvent> {
        self.engine.take_events()
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn cues(&self) -> &CueQueue {
        &self.cues
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn cues_changed(&mut self) {
        self.engine.push_event(StatusEvent::CuesChanged);
        self.persist();
    }

    /// A cell failed and was cleared by the engine; keep the cue queue in step.
    fn cell_failed(&mut self, error: CellError) {
        if self.cues.remove(error.cell()) {
            self.engine.push_event(StatusEvent::CuesChanged);
        }
        self.alert_cell_error(&error);
    }

    fn alert_cell_error(&mut self, error: &CellError) {
        warn!(err = %error, "Cell failed");
        let cell = (error.cell() + 1).to_string();
        self.alert(error.translation_key(), &[("cell", &cell)]);
    }

    fn alert_invalid_cell(&mut self, index: usize) {
        let cell = (index + 1).to_string();
        self.alert("invalid_cell", &[("cell", &cell)]);
    }

    fn alert(&mut self, key: &str, args: &[(&str, &str)]) {
        let text = i18n::format(&self.translations.get_string(key), args);
        self.engine.push_event(StatusEvent::Alert(text));
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        let Some(persistence) = self.persistence.as_mut() else {
            return;
        };
        if let Err(e) = persistence.save(&snapshot) {
            warn!(err = %e, "Unable to save session");
            self.alert("session_save_failed", &[]);
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::audio::mixer::AudioMixer;
    use crate::engine::timers::ManualClock;
    use crate::i18n::Translations;
    use crate::session::SessionError;
    use crate::testutil::{wav_bytes, EngineFixture, TEST_SAMPLE_RATE};

    /// Keeps the last saved snapshot where the test can see it.
    #[derive(Clone, Default)]
    struct SharedAdapter {
        saved: Arc<Mutex<Option<Snapshot>>>,
        saves: Arc<Mutex<usize>>,
    }

    impl PersistenceAdapter for SharedAdapter {
        fn load(&self) -> Result<Option<Snapshot>, SessionError> {
            Ok(self.saved.lock().clone())
        }

        fn save(&mut self, snapshot: &Snapshot) -> Result<(), SessionError> {
            *self.saved.lock() = Some(snapshot.clone());
            *self.saves.lock() += 1;
            Ok(())
        }
    }

    struct Board {
        board: Soundboard,
        mixer: Arc<AudioMixer>,
        clock: Arc<ManualClock>,
        adapter: SharedAdapter,
    }

    impl Board {
        fn new(settings: Settings) -> Board {
            let fixture = EngineFixture::new(4);
            let adapter = SharedAdapter::default();
            let board = Soundboard::new(
                fixture.engine,
                settings,
                Box::new(Translations::default()),
                Some(Box::new(adapter.clone())),
            );
            Board {
                board,
                mixer: fixture.mixer,
                clock: fixture.clock,
                adapter,
            }
        }

        fn load(&mut self, index: usize) {
            assert!(self.board.load_sound(
                Some(index),
                &format!("sound {}", index),
                wav_bytes(4000, TEST_SAMPLE_RATE, 1)
            ));
        }

        fn advance(&mut self, duration: Duration) {
            self.mixer
                .process_frames(self.mixer.duration_to_samples(duration) as usize);
            self.clock.advance(duration);
            self.board.tick();
        }

        fn alerts(&mut self) -> Vec<String> {
            self.board
                .take_events()
                .into_iter()
                .filter_map(|event| match event {
                    StatusEvent::Alert(text) => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_play_key() {
        let mut board = Board::new(Settings::default());
        board.load(1);

        assert!(board.board.play_key('2'));
        assert!(board.board.engine().is_cell_active(1));
        assert!(!board.board.play_key('1'));
        assert!(!board.board.play_key('z'));
    }

    #[test]
    fn test_load_into_first_empty_until_full() {
        let mut board = Board::new(Settings::default());
        board.load(0);

        for expected in 1..4 {
            assert!(board
                .board
                .load_sound(None, "clip", wav_bytes(400, TEST_SAMPLE_RATE, 1)));
            assert!(board
                .board
                .engine()
                .cells()
                .get(expected)
                .is_some_and(|c| !c.is_empty()));
        }
        board.board.take_events();

        assert!(!board
            .board
            .load_sound(None, "clip", wav_bytes(400, TEST_SAMPLE_RATE, 1)));
        assert_eq!(board.alerts(), vec!["Every cell already holds a sound."]);

        assert!(!board
            .board
            .load_sound(Some(9), "clip", wav_bytes(400, TEST_SAMPLE_RATE, 1)));
        assert_eq!(board.alerts(), vec!["There is no cell 10."]);
    }

    #[test]
    fn test_corrupted_cue_alerts_and_is_dropped() {
        let mut board = Board::new(Settings::default());
        board.load(0);
        board.load(2);
        assert!(board.board.toggle_cue(0));
        assert!(board.board.toggle_cue(2));
        board.board.engine.attach_stored(0, "sound-gone".to_string());
        board.board.take_events();

        assert!(board.board.go_next());
        assert_eq!(board.board.cues().queue(), &[2]);
        assert!(board.board.engine().is_cell_active(2));
        assert_eq!(
            board.alerts(),
            vec!["The sound for cell 1 is no longer stored and has been removed."]
        );
    }

    #[test]
    fn test_preload_failure_keeps_cell() {
        let mut board = Board::new(Settings::default());
        board.load(0);
        board.load(2);
        board.board.engine.attach_stored(0, "sound-gone".to_string());
        board.board.take_events();

        assert_eq!(board.board.preload(), vec![0]);
        assert_eq!(
            board.alerts(),
            vec!["The sound in cell 1 could not be read."]
        );
        assert!(board
            .board
            .engine()
            .cells()
            .get(0)
            .is_some_and(|c| !c.is_empty()));
    }

    #[test]
    fn test_failed_direct_play_uncues() {
        let mut board = Board::new(Settings::default());
        board.load(1);
        board.board.toggle_cue(1);
        board.board.engine.attach_stored(1, "sound-gone".to_string());

        assert!(!board.board.play(1));
        assert!(board.board.cues().queue().is_empty());
        assert!(board
            .board
            .engine()
            .cells()
            .get(1)
            .is_some_and(|c| c.is_empty()));
    }

    #[test]
    fn test_clear_cued_cell() {
        let mut board = Board::new(Settings::default());
        board.load(0);
        board.load(1);
        board.board.toggle_cue(0);
        board.board.toggle_cue(1);
        board.board.go_next();

        assert!(board.board.clear_cell(0));
        assert_eq!(board.board.cues().queue(), &[1]);
        assert_eq!(board.board.cues().cursor(), None);
        assert!(!board.board.clear_cell(0));

        assert!(board.board.clear_all());
        assert!(board.board.cues().queue().is_empty());
        assert!(board.board.engine().cells().iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_uncue_all() {
        let mut board = Board::new(Settings::default());
        assert!(!board.board.uncue_all());

        board.load(0);
        board.load(3);
        board.board.toggle_cue(3);
        board.board.toggle_cue(0);
        assert!(board.board.uncue_all());
        assert!(board.board.cues().queue().is_empty());
        assert!(board.board.engine().cells().iter().all(|c| !c.is_cued));
    }

    #[test]
    fn test_master_volume_is_clamped_and_live() {
        let mut board = Board::new(Settings::default());
        board.board.set_master_volume(1.5);
        assert_eq!(board.mixer.master_volume(), 1.0);
        board.board.set_master_volume(-1.0);
        assert_eq!(board.mixer.master_volume(), 0.0);
        board.board.set_master_volume(0.3);
        assert_eq!(board.board.settings().master_volume, 0.3);
        assert_eq!(board.mixer.master_volume(), 0.3);
    }

    #[test]
    fn test_autokill_setting() {
        let mut board = Board::new(Settings::default());
        board.load(0);
        board.load(1);
        board.board.set_autokill(true);

        board.board.play(0);
        board.board.play(1);
        assert!(!board.board.engine().is_cell_active(0));

        board.board.set_autokill(false);
        board.board.play(0);
        assert!(board.board.engine().is_cell_active(1));
    }

    #[test]
    fn test_play_multiple_setting() {
        let mut board = Board::new(Settings::default());
        board.load(0);
        board.board.play(0);
        board.board.play(0);
        assert_eq!(board.board.engine().cell_instance_count(0), 1);

        board.board.set_play_multiple(true);
        board.board.play(0);
        assert_eq!(board.board.engine().cell_instance_count(0), 2);
    }

    #[test]
    fn test_assign_key() {
        let mut board = Board::new(Settings::default());
        assert!(!board.board.assign_key(0, 'x'));
        assert_eq!(
            board.alerts(),
            vec!["Keys can't be reassigned on this board."]
        );

        let mut board = Board::new(Settings {
            reassignable_keys: true,
            ..Default::default()
        });
        assert!(board.board.assign_key(3, '1'));
        assert_eq!(board.board.engine().cells().index_for_key('1'), Some(3));
        assert_eq!(board.board.engine().cells().get(0).and_then(|c| c.key), None);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut board = Board::new(Settings {
            reassignable_keys: true,
            ..Default::default()
        });
        board.load(0);
        board.load(2);
        board.board.rename(2, "Applause");
        board.board.set_loop(2, true);
        board.board.toggle_cue(0);
        board.board.toggle_cue(2);
        board.board.go_next();
        board.board.assign_key(2, 'z');
        board.board.set_fade_out(Duration::from_millis(250));
        board.board.set_master_volume(0.5);
        board.board.set_autokill(true);

        let snapshot = board.board.snapshot();
        assert_eq!(snapshot.cue_queue, vec![0, 2]);
        assert_eq!(snapshot.cue_cursor, Some(0));
        assert_eq!(snapshot.fade_out, 0.25);
        assert_eq!(
            board.adapter.saved.lock().as_ref(),
            Some(&snapshot),
            "every mutation is persisted"
        );

        // Scramble the board, then restore what was saved.
        board.board.stop_all();
        board.board.set_master_volume(1.0);
        board.board.set_autokill(false);
        *board.adapter.saved.lock() = Some(snapshot.clone());
        assert!(board.board.restore());

        let restored = board.board.snapshot();
        assert_eq!(restored, snapshot);
        assert_eq!(board.mixer.master_volume(), 0.5);
        let cell = board.board.engine().cells().get(2).expect("cell 2");
        assert_eq!(cell.name, "Applause");
        assert_eq!(cell.key, Some('z'));
        assert!(cell.is_looping && cell.is_cued);
        assert!(cell.buffer().is_none());

        // Sounds are resolved lazily from storage.
        assert!(board.board.play(2));
        assert!(board
            .board
            .engine()
            .cells()
            .get(2)
            .is_some_and(|c| c.buffer().is_some()));
    }

    #[test]
    fn test_mutations_trigger_saves() {
        let mut board = Board::new(Settings::default());
        board.load(0);
        let before = *board.adapter.saves.lock();

        board.board.toggle_cue(0);
        board.board.set_fade_in(Duration::from_millis(10));
        board.board.rename(0, "Bell");
        assert_eq!(*board.adapter.saves.lock(), before + 3);

        // Playing and stopping don't touch persisted state.
        board.board.play(0);
        board.board.stop_all();
        board.advance(Duration::from_millis(200));
        assert_eq!(*board.adapter.saves.lock(), before + 3);
    }

    #[test]
    fn test_load_missing_file_alerts() {
        let mut board = Board::new(Settings::default());
        assert!(!board
            .board
            .load_file(None, Path::new("/nonexistent/boom.wav")));
        assert_eq!(board.alerts(), vec!["Unable to read /nonexistent/boom.wav."]);
    }
}
