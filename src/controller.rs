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
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::MissedTickBehavior;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::audio::OutputHandle;
use crate::engine::StatusEvent;
use crate::soundboard::Soundboard;

pub mod keyboard;

/// How often finished sounds and due timers are processed.
const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Controller events that will trigger behavior on the soundboard. Cells are
/// zero-based.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Plays the cell.
    Play(usize),

    /// Plays the cell assigned to the key.
    PlayKey(char),

    /// Adds the cell to the cue queue, or removes it if already cued.
    ToggleCue(usize),

    /// Plays the next idle cue.
    Go,

    /// Moves the cue cursor back one entry.
    Back,

    /// Silences everything immediately.
    StopAll,

    /// Fades out every instance of the cell.
    Fadeout(usize),

    /// Empties the cue queue.
    UncueAll,

    /// Flips the cell's loop flag.
    ToggleLoop(usize),

    /// Empties the cell.
    Clear(usize),

    /// Empties every cell.
    ClearAll,

    /// Sets the master volume.
    Volume(f32),

    /// Sets the fade applied when sounds start.
    FadeIn(Duration),

    /// Sets the fade applied when sounds stop.
    FadeOut(Duration),

    /// Allows or forbids a cell playing over itself.
    PlayMultiple(bool),

    /// Turns autokill on or off.
    Autokill(bool),

    /// Loads a sound file into the cell, or the first empty cell.
    Load { path: PathBuf, cell: Option<usize> },

    /// Renames the cell.
    Rename { cell: usize, name: String },

    /// Assigns a key to the cell.
    AssignKey { cell: usize, key: char },

    /// Shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives a soundboard from a driver's events.
pub struct Controller {
    handle: JoinHandle<Soundboard>,
}

impl Controller {
    /// Creates a new controller with the given driver. The output keeps rendering
    /// until the controller finishes.
    pub fn new(
        soundboard: Soundboard,
        output: OutputHandle,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, Box<dyn Error>> {
        let span = span!(Level::INFO, "controller");
        Ok(Controller {
            handle: tokio::spawn(
                Controller::trigger_events(soundboard, output, driver).instrument(span),
            ),
        })
    }

    /// Join will block until the controller finishes, handing back the soundboard.
    pub async fn join(&mut self) -> Result<Soundboard, JoinError> {
        (&mut self.handle).await
    }

    /// Applies driver events to the soundboard and ticks it until the driver
    /// closes or asks to quit.
    async fn trigger_events(
        mut soundboard: Soundboard,
        output: OutputHandle,
        driver: Arc<dyn Driver>,
    ) -> Soundboard {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let join_handle = driver.monitor_events(events_tx);

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(cells = soundboard.engine().cells().len(), "Controller started.");

        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(Event::Quit) => {
                        info!("Quit requested.");
                        break;
                    }
                    Some(event) => {
                        info!(event = format!("{:?}", event), "Received event.");
                        if !apply(&mut soundboard, event) {
                            debug!("Event had no effect.");
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => soundboard.tick(),
            }
            report(&mut soundboard);
        }

        info!("Controller closing.");
        soundboard.stop_all();
        drop(events_rx);
        match join_handle.await {
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
            Ok(Ok(())) => {}
        }
        drop(output);
        soundboard
    }
}

/// Applies one event. Returns false if it changed nothing.
fn apply(soundboard: &mut Soundboard, event: Event) -> bool {
    match event {
        Event::Play(cell) => soundboard.play(cell),
        Event::PlayKey(key) => soundboard.play_key(key),
        Event::ToggleCue(cell) => soundboard.toggle_cue(cell),
        Event::Go => soundboard.go_next(),
        Event::Back => soundboard.go_previous(),
        Event::StopAll => soundboard.stop_all(),
        Event::Fadeout(cell) => soundboard.fadeout_cell(cell),
        Event::UncueAll => soundboard.uncue_all(),
        Event::ToggleLoop(cell) => soundboard.toggle_loop(cell),
        Event::Clear(cell) => soundboard.clear_cell(cell),
        Event::ClearAll => soundboard.clear_all(),
        Event::Volume(volume) => soundboard.set_master_volume(volume),
        Event::FadeIn(fade) => soundboard.set_fade_in(fade),
        Event::FadeOut(fade) => soundboard.set_fade_out(fade),
        Event::PlayMultiple(play_multiple) => soundboard.set_play_multiple(play_multiple),
        Event::Autokill(autokill) => soundboard.set_autokill(autokill),
        Event::Load { path, cell } => soundboard.load_file(cell, &path),
        Event::Rename { cell, name } => soundboard.rename(cell, &name),
        Event::AssignKey { cell, key } => soundboard.assign_key(cell, key),
        // Handled by the event loop.
        Event::Quit => false,
    }
}

/// Logs the soundboard's status events. Alerts are also shown to the user.
fn report(soundboard: &mut Soundboard) {
    for event in soundboard.take_events() {
        match event {
            StatusEvent::NowPlaying(cell) => info!(cell = cell + 1, "Now playing."),
            StatusEvent::NowIdle(cell) => info!(cell = cell + 1, "Now idle."),
            StatusEvent::CellChanged(cell) => {
                if let Some(cell) = soundboard.engine().cells().get(cell) {
                    debug!(cell = %cell, "Cell changed.");
                }
            }
            StatusEvent::CuesChanged => debug!(cues = %soundboard.cues(), "Cues changed."),
            StatusEvent::Alert(text) => {
                warn!(alert = %text, "Alert.");
                println!("{}", text);
            }
        }
    }
}
