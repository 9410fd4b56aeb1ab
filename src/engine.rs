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

//! The playback engine: starts, stops and fades cell instances.
//!
//! Gain ramps and voice start/stop positions live on the audio clock (the
//! mixer's sample counter). Cleanup that has to happen after the audio has
//! finished (detaching voices, reporting that a faded cell went idle) is
//! scheduled on the wall clock and fired from [`PlaybackEngine::tick`].

pub mod instance;
pub mod timers;

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::audio::decode::{DecodeError, DecodedBuffer};
use crate::audio::envelope::{GainEnvelope, SILENT_GAIN};
use crate::audio::mixer::{AudioMixer, VoiceControl};
use crate::cells::{random_buffer_id, random_color, CellRegistry, CellUpdate};
use crate::store::{AudioBufferStore, StoreError};

use self::instance::{InstanceRegistry, PlayingInstance};
use self::timers::{Clock, Timer, TimerQueue};

/// Fade applied to the previously triggered cell when autokill is on.
pub const AUTOKILL_FADE: Duration = Duration::from_millis(100);

/// How long a voice keeps rendering (at silence) after its fade-out ends.
pub const STOP_GUARD: Duration = Duration::from_millis(50);

/// How long after a voice stops it is detached from the mixer.
pub const DISCONNECT_DELAY: Duration = Duration::from_millis(100);

/// Per-call playback options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub fade_in: Duration,
    pub fade_out: Duration,
    /// Let the new instance join the cell's running ones instead of replacing them.
    pub allow_multiple: bool,
    /// Stop the previously triggered cell first.
    pub autokill: bool,
    /// Remember this cell as the previously triggered one.
    pub record_last_played: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            fade_in: Duration::ZERO,
            fade_out: Duration::ZERO,
            allow_multiple: false,
            autokill: false,
            record_last_played: true,
        }
    }
}

/// Changes the surface around the engine should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    NowPlaying(usize),
    NowIdle(usize),
    /// A cell's sound or metadata changed.
    CellChanged(usize),
    CuesChanged,
    /// A user-facing, already translated message.
    Alert(String),
}

/// Failures scoped to a single cell. The cell is always left empty.
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    #[error("Unable to decode the sound in cell {cell}: {source}")]
    Decode {
        cell: usize,
        #[source]
        source: DecodeError,
    },

    #[error("The stored sound for cell {cell} is missing")]
    StorageMissing { cell: usize },

    #[error("Storage error for cell {cell}: {source}")]
    Storage {
        cell: usize,
        #[source]
        source: StoreError,
    },
}

impl CellError {
    fn from_store(cell: usize, error: StoreError) -> CellError {
        match error {
            StoreError::NotFound(_) => CellError::StorageMissing { cell },
            StoreError::Decode(source) => CellError::Decode { cell, source },
            source => CellError::Storage { cell, source },
        }
    }

    /// The cell the error happened in.
    pub fn cell(&self) -> usize {
        match self {
            CellError::Decode { cell, .. }
            | CellError::StorageMissing { cell }
            | CellError::Storage { cell, .. } => *cell,
        }
    }

    /// The key of the user-facing message for this error.
    pub fn translation_key(&self) -> &'static str {
        match self {
            CellError::Decode { .. } => "decode_failed",
            CellError::StorageMissing { .. } => "storage_missing",
            CellError::Storage { .. } => "storage_failed",
        }
    }
}

/// Owns the cells, the stored sounds and every live instance.
pub struct PlaybackEngine {
    cells: CellRegistry,
    /// The default key layout.
    keys: Vec<char>,
    store: Box<dyn AudioBufferStore>,
    mixer: Arc<AudioMixer>,
    /// Voices that reached their end on the audio thread.
    ended_rx: Receiver<u64>,
    instances: InstanceRegistry,
    timers: TimerQueue,
    clock: Arc<dyn Clock>,
    /// The most recently triggered cell, used by autokill.
    last_played: Option<usize>,
    events: Vec<StatusEvent>,
}

impl PlaybackEngine {
    /// Creates an engine with one empty cell per key.
    pub fn new(
        keys: Vec<char>,
        store: Box<dyn AudioBufferStore>,
        mixer: Arc<AudioMixer>,
        clock: Arc<dyn Clock>,
    ) -> PlaybackEngine {
        let ended_rx = mixer.ended_voices();
        PlaybackEngine {
            cells: CellRegistry::new(keys.clone()),
            keys,
            store,
            mixer,
            ended_rx,
            instances: InstanceRegistry::default(),
            timers: TimerQueue::default(),
            clock,
            last_played: None,
            events: Vec::new(),
        }
    }

    /// Starts a new instance of the cell's sound. Returns `Ok(false)` for an empty
    /// or unknown cell. If the sound can't be resolved the cell is stopped and cleared.
    pub fn play(&mut self, index: usize, options: PlayOptions) -> Result<bool, CellError> {
        let looping = match self.cells.get(index) {
            Some(cell) if !cell.is_empty() => cell.is_looping,
            _ => {
                debug!(cell = index, "Ignoring trigger of empty cell");
                return Ok(false);
            }
        };

        let buffer = match self.fetch_buffer(index) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(cell = index, err = %e, "Unable to resolve sound, clearing cell");
                self.fadeout_cell(index, Duration::ZERO);
                self.discard_cell(index);
                return Err(e);
            }
        };

        if options.autokill {
            if let Some(previous) = self.last_played.filter(|previous| *previous != index) {
                self.fadeout_cell(previous, AUTOKILL_FADE);
            }
        }
        if !options.allow_multiple {
            self.fadeout_cell(index, options.fade_out);
        }

        let now = self.mixer.current_sample();
        let mut envelope = GainEnvelope::new(SILENT_GAIN);
        if options.fade_in.is_zero() {
            envelope.set_value_at(1.0, now);
        } else {
            envelope.set_value_at(SILENT_GAIN, now);
            envelope.linear_ramp_to(1.0, now + self.mixer.duration_to_samples(options.fade_in));
        }

        let control = Arc::new(VoiceControl::new(envelope, looping));
        self.mixer.add_voice(buffer, control.clone(), now);
        let instance = PlayingInstance {
            id: control.id(),
            cell: index,
            started_at: now as f64 / self.mixer.sample_rate() as f64,
            control,
        };
        info!(
            cell = index,
            instance = instance.id,
            started_at = instance.started_at,
            looping,
            "Playing cell"
        );
        self.instances.insert(instance);

        if options.record_last_played {
            self.last_played = Some(index);
        }
        self.events.push(StatusEvent::NowPlaying(index));
        Ok(true)
    }

    /// Fades an instance out and schedules its cleanup. Returns false if the
    /// instance had already been removed.
    pub fn stop_instance(&mut self, id: u64, fade_out: Duration) -> bool {
        let Some(removed) = self.instances.remove(id) else {
            debug!(instance = id, "Instance already stopped");
            return false;
        };
        let control = removed.instance.control;

        let now = self.mixer.current_sample();
        let fade_end = now + self.mixer.duration_to_samples(fade_out);
        control.with_envelope(|envelope| {
            envelope.cancel_and_hold(now);
            envelope.linear_ramp_to(SILENT_GAIN, fade_end);
        });
        control.stop_at(fade_end + self.mixer.duration_to_samples(STOP_GUARD));

        let wall_now = self.clock.now();
        self.timers.schedule(
            wall_now + fade_out + STOP_GUARD + DISCONNECT_DELAY,
            Timer::Disconnect(control),
        );
        if removed.cell_idle {
            self.timers
                .schedule(wall_now + fade_out, Timer::IdleSignal(removed.instance.cell));
        }

        debug!(
            cell = removed.instance.cell,
            instance = id,
            fade_ms = fade_out.as_millis() as u64,
            "Stopping instance"
        );
        true
    }

    /// Stops every instance of the cell. Returns the number stopped.
    pub fn fadeout_cell(&mut self, index: usize, fade: Duration) -> usize {
        self.instances
            .ids_for_cell(index)
            .into_iter()
            .filter(|id| self.stop_instance(*id, fade))
            .count()
    }

    /// Stops every instance. All registry queries report zero active instances
    /// as soon as this returns.
    pub fn stop_all(&mut self, fade: Duration) -> usize {
        let stopped = self
            .instances
            .ids()
            .into_iter()
            .filter(|id| self.stop_instance(*id, fade))
            .count();
        self.last_played = None;
        info!(stopped, "Stopped all instances");
        stopped
    }

    /// Fades the cell out, deletes its stored sound and resets it. Returns false
    /// for an empty cell.
    pub fn clear_cell(&mut self, index: usize, fade: Duration) -> bool {
        if self.cells.get(index).is_none_or(|cell| cell.is_empty()) {
            return false;
        }

        self.fadeout_cell(index, fade);
        self.discard_cell(index);
        info!(cell = index, "Cleared cell");
        true
    }

    /// Sets the cell's loop flag and applies it to every running instance.
    pub fn set_loop(&mut self, index: usize, looping: bool) -> bool {
        if self.cells.get(index).is_none_or(|cell| cell.is_empty()) {
            return false;
        }

        self.cells.set(
            index,
            CellUpdate {
                is_looping: Some(looping),
                ..Default::default()
            },
        );
        for control in self.instances.controls_for_cell(index) {
            control.set_looping(looping);
        }
        debug!(cell = index, looping, "Loop changed");
        self.events.push(StatusEvent::CellChanged(index));
        true
    }

    /// Replaces whatever the cell held with the given sound. Returns `Ok(false)`
    /// for an unknown cell. On failure the cell is left empty.
    pub fn load_sound(&mut self, index: usize, name: &str, bytes: Vec<u8>) -> Result<bool, CellError> {
        if index >= self.cells.len() {
            return Ok(false);
        }

        self.fadeout_cell(index, Duration::ZERO);
        self.discard_cell(index);

        let buffer = self
            .store
            .decode(bytes.clone())
            .map_err(|e| CellError::from_store(index, e))?;
        let buffer_id = random_buffer_id();
        self.store
            .persist(&buffer_id, &bytes)
            .map_err(|e| CellError::from_store(index, e))?;

        info!(
            cell = index,
            name,
            id = buffer_id,
            duration_ms = buffer.duration().as_millis() as u64,
            memory_kb = buffer.memory_size() / 1024,
            "Loaded sound"
        );
        self.cells
            .assign_buffer(index, buffer_id, Some(Arc::new(buffer)));
        self.cells.set(
            index,
            CellUpdate {
                name: Some(name.to_string()),
                color: Some(random_color()),
                ..Default::default()
            },
        );
        Ok(true)
    }

    /// Points a cell at already stored bytes without decoding them. The sound is
    /// resolved on first play.
    pub fn attach_stored(&mut self, index: usize, buffer_id: String) -> bool {
        let attached = self.cells.assign_buffer(index, buffer_id, None);
        if attached {
            self.events.push(StatusEvent::CellChanged(index));
        }
        attached
    }

    /// Resolves every stored sound that isn't cached yet. Failing cells are left
    /// untouched; their errors are returned.
    pub fn preload_all(&mut self) -> Vec<CellError> {
        let stored: Vec<usize> = self
            .cells
            .iter()
            .filter(|cell| !cell.is_empty())
            .map(|cell| cell.index())
            .collect();
        stored
            .into_iter()
            .filter_map(|index| self.fetch_buffer(index).err())
            .collect()
    }

    /// Drops a cell's cached sound. It is re-read from storage on the next play.
    pub fn evict_buffer(&mut self, index: usize) {
        self.cells.evict_buffer(index);
    }

    /// Stops everything, drops all pending timers and empties every cell without
    /// touching storage.
    pub fn reset(&mut self) {
        self.stop_all(Duration::ZERO);
        for timer in self.timers.clear() {
            if let Timer::Disconnect(control) = timer {
                control.disconnect();
            }
        }
        self.cells = CellRegistry::new(self.keys.clone());
        self.last_played = None;
    }

    /// Deletes every stored sound and empties every cell.
    pub fn clear_all(&mut self, fade: Duration) {
        self.stop_all(fade);
        if let Err(e) = self.store.clear_all() {
            warn!(err = %e, "Unable to clear stored sounds");
        }
        for index in 0..self.cells.len() {
            if self.cells.clear(index).is_some() {
                self.events.push(StatusEvent::CellChanged(index));
            }
        }
    }

    /// Processes voices that ended on the audio thread and fires due timers.
    pub fn tick(&mut self) {
        while let Ok(id) = self.ended_rx.try_recv() {
            if let Some(removed) = self.instances.remove(id) {
                debug!(
                    cell = removed.instance.cell,
                    instance = id,
                    "Instance finished"
                );
                removed.instance.control.disconnect();
                if removed.cell_idle {
                    self.events
                        .push(StatusEvent::NowIdle(removed.instance.cell));
                }
            }
        }

        for timer in self.timers.take_due(self.clock.now()) {
            match timer {
                Timer::Disconnect(control) => control.disconnect(),
                Timer::IdleSignal(cell) => {
                    if !self.instances.is_cell_active(cell) {
                        self.events.push(StatusEvent::NowIdle(cell));
                    }
                }
            }
        }
    }

    pub fn is_cell_active(&self, index: usize) -> bool {
        self.instances.is_cell_active(index)
    }

    pub fn is_any_active(&self) -> bool {
        !self.instances.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.instances.len()
    }

    pub fn cell_instance_count(&self, index: usize) -> usize {
        self.instances.cell_count(index)
    }

    pub fn last_played(&self) -> Option<usize> {
        self.last_played
    }

    /// Restores the autokill tracker from a snapshot.
    pub fn set_last_played(&mut self, index: Option<usize>) {
        self.last_played = index.filter(|index| *index < self.cells.len());
    }

    /// Returns and clears the pending status events.
    pub fn take_events(&mut self) -> Vec<StatusEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn push_event(&mut self, event: StatusEvent) {
        self.events.push(event);
    }

    pub fn cells(&self) -> &CellRegistry {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut CellRegistry {
        &mut self.cells
    }

    pub fn store(&self) -> &dyn AudioBufferStore {
        self.store.as_ref()
    }

    pub fn mixer(&self) -> &Arc<AudioMixer> {
        &self.mixer
    }

    /// Returns the cell's decoded sound, reading and caching it if needed.
    fn fetch_buffer(&mut self, index: usize) -> Result<Arc<DecodedBuffer>, CellError> {
        let Some(cell) = self.cells.get(index) else {
            return Err(CellError::StorageMissing { cell: index });
        };
        if let Some(buffer) = cell.buffer() {
            return Ok(buffer);
        }
        let Some(buffer_id) = cell.buffer_id().map(str::to_string) else {
            return Err(CellError::StorageMissing { cell: index });
        };

        let bytes = self
            .store
            .fetch(&buffer_id)
            .map_err(|e| CellError::from_store(index, e))?;
        let buffer = Arc::new(
            self.store
                .decode(bytes)
                .map_err(|e| CellError::from_store(index, e))?,
        );
        debug!(cell = index, id = buffer_id, "Resolved stored sound");
        self.cells.cache_buffer(index, buffer.clone());
        Ok(buffer)
    }

    /// Deletes the cell's stored bytes and resets its metadata.
    fn discard_cell(&mut self, index: usize) {
        if let Some(buffer_id) = self.cells.clear(index) {
            if let Err(e) = self.store.delete(&buffer_id) {
                warn!(cell = index, id = buffer_id, err = %e, "Unable to delete stored sound");
            }
        }
        if self.last_played == Some(index) {
            self.last_played = None;
        }
        self.events.push(StatusEvent::CellChanged(index));
    }
}
