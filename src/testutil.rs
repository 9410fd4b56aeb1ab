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
    f32::consts::PI,
    io::Cursor,
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{
    audio::mixer::AudioMixer,
    engine::{timers::ManualClock, PlaybackEngine},
    store::{AudioBufferStore, MemoryStore},
};

/// Sample rate used by engine fixtures. Low enough that tests render quickly.
pub const TEST_SAMPLE_RATE: u32 = 8000;

/// Builds the bytes of a 16-bit WAV file holding a 440 Hz tone.
pub fn wav_bytes(frames: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )
        .expect("unable to create wav writer");

        for frame in 0..frames {
            let t = frame as f32 / sample_rate as f32;
            let value = ((2.0 * PI * 440.0 * t).sin() * 0.5 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value).expect("unable to write sample");
            }
        }
        writer.finalize().expect("unable to finalize wav");
    }
    cursor.into_inner()
}

/// Calculate RMS (Root Mean Square) of a signal
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// A playback engine driven entirely by the test: the mixer is rendered and the
/// wall clock advanced by hand.
pub struct EngineFixture {
    pub engine: PlaybackEngine,
    pub mixer: Arc<AudioMixer>,
    pub clock: Arc<ManualClock>,
}

impl EngineFixture {
    /// Creates an engine with `cells` empty cells over a memory store.
    pub fn new(cells: usize) -> EngineFixture {
        Self::with_store(cells, Box::new(MemoryStore::new(TEST_SAMPLE_RATE)))
    }

    /// Creates an engine with `cells` empty cells over the given store.
    pub fn with_store(cells: usize, store: Box<dyn AudioBufferStore>) -> EngineFixture {
        let mixer = Arc::new(AudioMixer::new(1, TEST_SAMPLE_RATE));
        let clock = Arc::new(ManualClock::default());
        let keys = "1234567890qwertyuiop".chars().take(cells).collect::<Vec<_>>();
        let engine = PlaybackEngine::new(keys, store, mixer.clone(), clock.clone());
        EngineFixture {
            engine,
            mixer,
            clock,
        }
    }

    /// Loads a tone of the given length into a cell.
    pub fn load(&mut self, index: usize, duration: Duration) {
        let frames = (duration.as_secs_f64() * TEST_SAMPLE_RATE as f64) as usize;
        self.engine
            .load_sound(
                index,
                &format!("tone-{}", index),
                wav_bytes(frames, TEST_SAMPLE_RATE, 1),
            )
            .expect("unable to load test sound");
    }

    /// Renders `duration` of audio, advances the wall clock by the same amount and
    /// ticks the engine. Returns the rendered samples.
    pub fn advance(&mut self, duration: Duration) -> Vec<f32> {
        let frames = self.mixer.duration_to_samples(duration) as usize;
        let rendered = self.mixer.process_frames(frames);
        self.clock.advance(duration);
        self.engine.tick();
        rendered
    }
}
