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

//! Wall-clock timers that shadow events scheduled on the audio clock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::audio::mixer::VoiceControl;

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// The real wall clock.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

/// Work deferred until a wall-clock deadline.
pub enum Timer {
    /// Detach a stopped voice from the mixer.
    Disconnect(Arc<VoiceControl>),
    /// Report that a cell went idle after its fade-out, if it still is.
    IdleSignal(usize),
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timer::Disconnect(voice) => write!(f, "Disconnect({})", voice.id()),
            Timer::IdleSignal(cell) => write!(f, "IdleSignal({})", cell),
        }
    }
}

/// Timers ordered by deadline. Timers with the same deadline fire in the order
/// they were scheduled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: BTreeMap<(Duration, u64), Timer>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn schedule(&mut self, due: Duration, timer: Timer) {
        self.timers.insert((due, self.next_seq), timer);
        self.next_seq += 1;
    }

    /// Removes and returns every timer due at or before `now`.
    pub fn take_due(&mut self, now: Duration) -> Vec<Timer> {
        let pending = self.timers.split_off(&(now, u64::MAX));
        std::mem::replace(&mut self.timers, pending)
            .into_values()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Drops every pending timer without firing it.
    pub fn clear(&mut self) -> Vec<Timer> {
        std::mem::take(&mut self.timers).into_values().collect()
    }
}
