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

//! The fixed grid of soundboard cells.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::audio::decode::DecodedBuffer;
use crate::util::duration_minutes_seconds;

/// Display colors handed out to newly loaded sounds.
const PALETTE: &[&str] = &[
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#fabebe", "#008080", "#e6beff", "#9a6324", "#800000", "#aaffc3", "#808000",
];

const DEFAULT_COLOR: &str = "#808080";

/// Picks a display color for a newly loaded sound.
pub fn random_color() -> String {
    PALETTE
        .choose(&mut rand::thread_rng())
        .unwrap_or(&DEFAULT_COLOR)
        .to_string()
}

/// Generates a fresh storage id for a loaded sound.
pub fn random_buffer_id() -> String {
    format!("sound-{:016x}", rand::thread_rng().gen::<u64>())
}

/// One slot in the soundboard grid.
#[derive(Clone)]
pub struct Cell {
    index: usize,
    pub name: String,
    pub key: Option<char>,
    pub color: String,
    pub is_looping: bool,
    pub is_cued: bool,
    buffer_id: Option<String>,
    buffer: Option<Arc<DecodedBuffer>>,
}

impl Cell {
    fn new(index: usize, key: Option<char>) -> Cell {
        Cell {
            index,
            name: String::new(),
            key,
            color: DEFAULT_COLOR.to_string(),
            is_looping: false,
            is_cued: false,
            buffer_id: None,
            buffer: None,
        }
    }

    /// The cell's fixed position in the grid.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The storage id of the cell's sound.
    pub fn buffer_id(&self) -> Option<&str> {
        self.buffer_id.as_deref()
    }

    /// The cached decoded sound, if it hasn't been evicted.
    pub fn buffer(&self) -> Option<Arc<DecodedBuffer>> {
        self.buffer.clone()
    }

    /// A cell without stored bytes holds nothing and can't be played.
    pub fn is_empty(&self) -> bool {
        self.buffer_id.is_none()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("key", &self.key)
            .field("buffer_id", &self.buffer_id)
            .field("cached", &self.buffer.is_some())
            .finish()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key.map(String::from).unwrap_or_else(|| "-".into());
        if self.is_empty() {
            return write!(f, "[{}] {:>2}: (empty)", key, self.index + 1);
        }

        write!(f, "[{}] {:>2}: {}", key, self.index + 1, self.name)?;
        if let Some(buffer) = &self.buffer {
            write!(f, " ({})", duration_minutes_seconds(buffer.duration()))?;
        }
        if self.is_looping {
            write!(f, " loop")?;
        }
        if self.is_cued {
            write!(f, " cued")?;
        }
        Ok(())
    }
}

/// A partial update to a cell's user-visible properties.
#[derive(Debug, Default, Clone)]
pub struct CellUpdate {
    pub name: Option<String>,
    pub key: Option<Option<char>>,
    pub color: Option<String>,
    pub is_looping: Option<bool>,
    pub is_cued: Option<bool>,
}

/// The authoritative mapping from cell index to sound metadata.
pub struct CellRegistry {
    cells: Vec<Cell>,
    /// The default key layout, restored when a cell is cleared.
    layout: Vec<char>,
}

impl CellRegistry {
    /// Creates one empty cell per key in the layout.
    pub fn new(keys: Vec<char>) -> CellRegistry {
        let cells = keys
            .iter()
            .enumerate()
            .map(|(index, key)| Cell::new(index, Some(*key)))
            .collect();
        CellRegistry {
            cells,
            layout: keys,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Applies a partial update. A key that another cell holds is taken from it.
    /// Returns false if the index is out of range.
    pub fn set(&mut self, index: usize, update: CellUpdate) -> bool {
        if index >= self.cells.len() {
            return false;
        }

        if let Some(Some(key)) = update.key {
            for cell in self.cells.iter_mut() {
                if cell.index != index && cell.key == Some(key) {
                    cell.key = None;
                }
            }
        }

        let cell = &mut self.cells[index];
        if let Some(name) = update.name {
            cell.name = name;
        }
        if let Some(key) = update.key {
            cell.key = key;
        }
        if let Some(color) = update.color {
            cell.color = color;
        }
        if let Some(is_looping) = update.is_looping {
            cell.is_looping = is_looping;
        }
        if let Some(is_cued) = update.is_cued {
            cell.is_cued = is_cued;
        }
        true
    }

    /// Points a cell at stored bytes. `buffer` may be `None` to resolve lazily.
    pub fn assign_buffer(
        &mut self,
        index: usize,
        buffer_id: String,
        buffer: Option<Arc<DecodedBuffer>>,
    ) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) => {
                cell.buffer_id = Some(buffer_id);
                cell.buffer = buffer;
                true
            }
            None => false,
        }
    }

    /// Caches a resolved buffer on a cell that already has stored bytes.
    pub fn cache_buffer(&mut self, index: usize, buffer: Arc<DecodedBuffer>) {
        if let Some(cell) = self.cells.get_mut(index) {
            if !cell.is_empty() {
                cell.buffer = Some(buffer);
            }
        }
    }

    /// Drops the cached buffer; it is re-resolved from storage on the next play.
    pub fn evict_buffer(&mut self, index: usize) {
        if let Some(cell) = self.cells.get_mut(index) {
            cell.buffer = None;
        }
    }

    /// Resets a cell to empty and returns the storage id it held.
    pub fn clear(&mut self, index: usize) -> Option<String> {
        let layout_key = self.layout.get(index).copied();
        let held_by_other = self
            .cells
            .iter()
            .any(|c| c.index != index && c.key.is_some() && c.key == layout_key);

        let cell = self.cells.get_mut(index)?;
        let buffer_id = cell.buffer_id.take();
        let key = if held_by_other { cell.key } else { layout_key };
        *cell = Cell::new(index, key);
        buffer_id
    }

    /// Returns the first cell without a sound.
    pub fn first_empty(&self) -> Option<usize> {
        self.cells.iter().position(Cell::is_empty)
    }

    /// Returns the cell triggered by the given key.
    pub fn index_for_key(&self, key: char) -> Option<usize> {
        self.cells
            .iter()
            .find(|cell| cell.key == Some(key))
            .map(Cell::index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl fmt::Display for CellRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in self.cells.iter() {
            writeln!(f, "{}", cell)?;
        }
        Ok(())
    }
}
