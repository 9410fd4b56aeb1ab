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
use core::fmt;

use tracing::{debug, info, span, Level, Span};

use crate::cells::{CellRegistry, CellUpdate};
use crate::engine::{CellError, PlayOptions, PlaybackEngine};

/// The result of a GO.
#[derive(Debug, Default)]
pub struct GoOutcome {
    /// The cell that started playing.
    pub played: Option<usize>,
    /// Cued cells that couldn't be played and were dropped from the queue.
    pub failed: Vec<CellError>,
}

/// CueQueue is an ordered subset of cells played one after another with GO.
pub struct CueQueue {
    /// Cued cell indices, strictly increasing.
    queue: Vec<usize>,
    /// Position of the last GO in the queue.
    cursor: Option<usize>,
    /// The logging span.
    span: Span,
}

impl fmt::Display for CueQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cues ({} cells):", self.queue.len())?;
        for (position, cell) in self.queue.iter().enumerate() {
            let marker = if self.cursor == Some(position) { ">" } else { " " };
            writeln!(f, " {} cell {}", marker, cell + 1)?;
        }

        Ok(())
    }
}

impl Default for CueQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CueQueue {
    pub fn new() -> CueQueue {
        CueQueue {
            queue: Vec::new(),
            cursor: None,
            span: span!(Level::INFO, "cues"),
        }
    }

    pub fn queue(&self) -> &[usize] {
        &self.queue
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The cell under the cursor.
    pub fn current(&self) -> Option<usize> {
        self.cursor.and_then(|position| self.queue.get(position).copied())
    }

    pub fn contains(&self, index: usize) -> bool {
        self.queue.binary_search(&index).is_ok()
    }

    /// Flips a cell's membership. Empty cells can't be cued. Returns true if the
    /// queue changed.
    pub fn toggle(&mut self, cells: &mut CellRegistry, index: usize) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();
        if cells.get(index).is_none_or(|cell| cell.is_empty()) {
            return false;
        }

        let cued = match self.queue.binary_search(&index) {
            Ok(_) => {
                self.remove(index);
                false
            }
            Err(position) => {
                self.queue.insert(position, index);
                true
            }
        };
        cells.set(
            index,
            CellUpdate {
                is_cued: Some(cued),
                ..Default::default()
            },
        );
        debug!(cell = index, cued, "Toggled cue");
        true
    }

    /// Drops a cell from the queue, moving the cursor back if the removed entry
    /// was at or before it. Returns false if the cell wasn't cued.
    pub fn remove(&mut self, index: usize) -> bool {
        let Ok(position) = self.queue.binary_search(&index) else {
            return false;
        };
        self.queue.remove(position);
        if let Some(cursor) = self.cursor {
            if position <= cursor {
                self.cursor = cursor.checked_sub(1);
            }
        }
        self.clamp();
        true
    }

    /// Moves to the next idle cued cell and plays it. Busy cells are skipped; the
    /// cursor never wraps. Cells that fail to play are dropped from the queue and
    /// the scan continues.
    pub fn go_next(&mut self, engine: &mut PlaybackEngine, options: PlayOptions) -> GoOutcome {
        let span = self.span.clone();
        let _enter = span.enter();
        let options = PlayOptions {
            allow_multiple: true,
            autokill: false,
            record_last_played: false,
            ..options
        };

        let mut outcome = GoOutcome::default();
        let mut start = self.cursor.map_or(0, |cursor| cursor + 1);
        while let Some(position) = self.next_idle(start, engine) {
            let cell = self.queue[position];
            match engine.play(cell, options) {
                Ok(true) => {
                    self.cursor = Some(position);
                    outcome.played = Some(cell);
                    info!(position, cell, "GO");
                    break;
                }
                Ok(false) => {
                    debug!(cell, "Dropping empty cell from the cue queue");
                    self.queue.remove(position);
                }
                Err(e) => {
                    debug!(cell, err = %e, "Dropping unplayable cell from the cue queue");
                    self.queue.remove(position);
                    outcome.failed.push(e);
                }
            }
            start = position;
        }

        self.clamp();
        outcome
    }

    /// Position of the first idle entry at or after `from`.
    fn next_idle(&self, from: usize, engine: &PlaybackEngine) -> Option<usize> {
        (from..self.queue.len()).find(|position| !engine.is_cell_active(self.queue[*position]))
    }

    /// Moves the cursor back one entry without playing anything.
    pub fn go_previous(&mut self) -> bool {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                info!(position = cursor - 1, "GO-");
                true
            }
            _ => false,
        }
    }

    /// Empties the queue.
    pub fn remove_all(&mut self, cells: &mut CellRegistry) {
        for index in self.queue.drain(..) {
            cells.set(
                index,
                CellUpdate {
                    is_cued: Some(false),
                    ..Default::default()
                },
            );
        }
        self.cursor = None;
    }

    /// Rebuilds the queue from saved state. Entries that are empty, out of range
    /// or duplicated are dropped.
    pub fn restore(&mut self, cells: &mut CellRegistry, queue: &[usize], cursor: Option<usize>) {
        self.remove_all(cells);
        let mut restored: Vec<usize> = queue
            .iter()
            .copied()
            .filter(|index| cells.get(*index).is_some_and(|cell| !cell.is_empty()))
            .collect();
        restored.sort_unstable();
        restored.dedup();

        for index in restored.iter() {
            cells.set(
                *index,
                CellUpdate {
                    is_cued: Some(true),
                    ..Default::default()
                },
            );
        }
        self.queue = restored;
        self.cursor = cursor;
        self.clamp();
    }

    /// Keeps the cursor inside the queue.
    fn clamp(&mut self) {
        self.cursor = match (self.cursor, self.queue.len()) {
            (_, 0) => None,
            (Some(cursor), len) => Some(cursor.min(len - 1)),
            (None, _) => None,
        };
    }
}
