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
use std::{
    error::Error,
    fmt,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, span, Level};

use crate::audio::{mixer::AudioMixer, OutputHandle};
use crate::playsync::CancelHandle;

/// How much audio the mock renders per block.
const BLOCK: Duration = Duration::from_millis(10);

/// A mock device. Renders the mixer in real time and throws the audio away.
#[derive(Clone)]
pub struct Device {
    name: String,
    channels: u16,
    sample_rate: u32,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, channels: u16, sample_rate: u32) -> Device {
        Device {
            name: name.to_string(),
            channels: channels.max(1),
            sample_rate,
        }
    }
}

impl crate::audio::Device for Device {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&self, mixer: Arc<AudioMixer>) -> Result<OutputHandle, Box<dyn Error>> {
        info!(
            device = self.name,
            channels = self.channels,
            sample_rate = self.sample_rate,
            "Starting mock output."
        );

        let cancel_handle = CancelHandle::new();
        let block_frames = ((self.sample_rate as u64 * BLOCK.as_millis() as u64) / 1000).max(1) as usize;
        let thread = {
            let cancel_handle = cancel_handle.clone();
            let name = self.name.clone();
            thread::spawn(move || {
                let span = span!(Level::INFO, "mock output", device = %name);
                let _enter = span.enter();

                let mut scratch = vec![0.0f32; block_frames * mixer.num_channels() as usize];
                let mut deadline = Instant::now();
                while !cancel_handle.is_cancelled() {
                    mixer.process_into_output(&mut scratch, block_frames);
                    deadline += BLOCK;
                    spin_sleep::sleep(deadline.saturating_duration_since(Instant::now()));
                }
                debug!("Mock output stopped.");
            })
        };

        Ok(OutputHandle::new(cancel_handle, vec![thread]))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Channels={}) (Mock)", self.name, self.channels)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::audio::Device as _;
    use crate::testutil::eventually;

    #[test]
    fn test_mock_renders_until_dropped() -> Result<(), Box<dyn Error>> {
        let device = Device::get("mock-device", 2, 8000);
        assert_eq!(device.channels(), 2);
        assert_eq!(device.to_string(), "mock-device (Channels=2) (Mock)");

        let mixer = Arc::new(AudioMixer::new(device.channels(), device.sample_rate()));
        let output = device.start(mixer.clone())?;
        eventually(
            || mixer.current_sample() >= 800,
            "Mock output never rendered",
        );

        drop(output);
        let stopped_at = mixer.current_sample();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(mixer.current_sample(), stopped_at);
        Ok(())
    }
}
