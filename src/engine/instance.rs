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

//! Bookkeeping for live playbacks.
//!
//! Every instance is recorded twice: in the global set used by "stop all" and
//! under its owning cell. Both views are only ever changed together, so removing
//! an instance either updates both or neither.

use std::collections::HashMap;
use std::sync::Arc;

use crate::audio::mixer::VoiceControl;

/// One live playback of a cell's sound.
#[derive(Debug, Clone)]
pub struct PlayingInstance {
    /// The instance ID. Matches the mixer voice ID.
    pub id: u64,
    /// The cell that started this instance.
    pub cell: usize,
    /// Audio clock position (in seconds) at which playback began.
    pub started_at: f64,
    /// The mixer-side controls for the voice.
    pub control: Arc<VoiceControl>,
}

/// The result of removing an instance.
#[derive(Debug)]
pub struct Removed {
    pub instance: PlayingInstance,
    /// True if the cell has no instances left.
    pub cell_idle: bool,
}

#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: HashMap<u64, PlayingInstance>,
    by_cell: HashMap<usize, Vec<u64>>,
}

impl InstanceRegistry {
    pub fn insert(&mut self, instance: PlayingInstance) {
        self.by_cell
            .entry(instance.cell)
            .or_default()
            .push(instance.id);
        self.instances.insert(instance.id, instance);
    }

    /// Removes an instance from both views. Returns `None` if it was already removed,
    /// which makes cleanup safe to attempt more than once.
    pub fn remove(&mut self, id: u64) -> Option<Removed> {
        let instance = self.instances.remove(&id)?;
        let cell_idle = match self.by_cell.get_mut(&instance.cell) {
            Some(ids) => {
                ids.retain(|other| *other != id);
                ids.is_empty()
            }
            None => true,
        };
        if cell_idle {
            self.by_cell.remove(&instance.cell);
        }
        Some(Removed {
            instance,
            cell_idle,
        })
    }

    /// Returns the IDs of the cell's instances in start order.
    pub fn ids_for_cell(&self, cell: usize) -> Vec<u64> {
        self.by_cell.get(&cell).cloned().unwrap_or_default()
    }

    /// Returns every instance ID.
    pub fn ids(&self) -> Vec<u64> {
        self.instances.keys().copied().collect()
    }

    /// Returns the controls of the cell's instances.
    pub fn controls_for_cell(&self, cell: usize) -> impl Iterator<Item = &Arc<VoiceControl>> {
        self.by_cell
            .get(&cell)
            .into_iter()
            .flatten()
            .filter_map(|id| self.instances.get(id))
            .map(|instance| &instance.control)
    }

    pub fn get(&self, id: u64) -> Option<&PlayingInstance> {
        self.instances.get(&id)
    }

    pub fn cell_count(&self, cell: usize) -> usize {
        self.by_cell.get(&cell).map_or(0, Vec::len)
    }

    pub fn is_cell_active(&self, cell: usize) -> bool {
        self.cell_count(cell) > 0
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Checks that the two views describe the same set of instances.
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        let per_cell: usize = self.by_cell.values().map(Vec::len).sum();
        per_cell == self.instances.len()
            && self.by_cell.iter().all(|(cell, ids)| {
                !ids.is_empty()
                    && ids
                        .iter()
                        .all(|id| self.instances.get(id).is_some_and(|i| i.cell == *cell))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::GainEnvelope;

    fn instance(cell: usize) -> PlayingInstance {
        let control = Arc::new(VoiceControl::new(GainEnvelope::new(1.0), false));
        PlayingInstance {
            id: control.id(),
            cell,
            started_at: 0.0,
            control,
        }
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = InstanceRegistry::default();
        let a = instance(0);
        let b = instance(0);
        let c = instance(1);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        registry.insert(a);
        registry.insert(b);
        registry.insert(c);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.cell_count(0), 2);
        assert_eq!(registry.ids_for_cell(0), vec![a_id, b_id]);
        assert!(registry.is_consistent());

        let removed = registry.remove(a_id).expect("a should be registered");
        assert!(!removed.cell_idle);
        let removed = registry.remove(b_id).expect("b should be registered");
        assert!(removed.cell_idle);
        assert!(!registry.is_cell_active(0));
        assert!(registry.is_consistent());

        // Second removal is a no-op.
        assert!(registry.remove(b_id).is_none());
        assert_eq!(registry.ids(), vec![c_id]);
    }

    #[test]
    fn test_controls_for_cell() {
        let mut registry = InstanceRegistry::default();
        registry.insert(instance(2));
        registry.insert(instance(2));
        registry.insert(instance(3));

        assert_eq!(registry.controls_for_cell(2).count(), 2);
        assert_eq!(registry.controls_for_cell(4).count(), 0);
    }
}
