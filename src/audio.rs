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
use std::{error::Error, fmt, sync::Arc, thread};

use tracing::warn;

use crate::config;
use crate::playsync::CancelHandle;

use self::mixer::AudioMixer;

pub mod cpal;
pub mod decode;
pub mod envelope;
pub mod mixer;
pub mod mock;

/// An audio output the mixer can be rendered to.
pub trait Device: fmt::Display + Send + Sync {
    /// The number of output channels the mixer should render.
    fn channels(&self) -> u16;

    /// The sample rate the mixer should render at.
    fn sample_rate(&self) -> u32;

    /// Starts rendering the mixer to the output. Rendering continues until the
    /// returned handle is dropped.
    fn start(&self, mixer: Arc<AudioMixer>) -> Result<OutputHandle, Box<dyn Error>>;
}

/// Keeps an output running. Dropping it stops the output threads and waits for them.
pub struct OutputHandle {
    cancel_handle: CancelHandle,
    threads: Vec<thread::JoinHandle<()>>,
}

impl OutputHandle {
    pub(crate) fn new(cancel_handle: CancelHandle, threads: Vec<thread::JoinHandle<()>>) -> Self {
        Self {
            cancel_handle,
            threads,
        }
    }

    /// Returns true once the output has been asked to stop.
    pub fn is_stopped(&self) -> bool {
        self.cancel_handle.is_cancelled()
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                warn!("Output thread panicked");
            }
        }
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with "mock" produce a device that
/// renders in real time without any audio hardware.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(
            device,
            config.channels(),
            config.sample_rate(),
        )));
    };

    Ok(Arc::new(cpal::Device::get(device)?))
}
