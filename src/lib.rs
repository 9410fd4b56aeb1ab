// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
//! A keyboard-triggered soundboard with cue lists for live performances.

pub mod audio;
pub mod cells;
pub mod config;
pub mod controller;
pub mod cue;
pub mod engine;
pub mod i18n;
pub mod playsync;
pub mod session;
pub mod soundboard;
pub mod store;
#[cfg(test)]
mod testutil;
pub mod util;
