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
// Core audio mixing logic shared by every output device and by the tests.
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::decode::DecodedBuffer;
use super::envelope::GainEnvelope;

/// Marks a voice without a scheduled stop.
const NO_STOP: u64 = u64::MAX;

/// Global counter for generating unique voice IDs.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// The engine-side handle to a voice in the mixer. Everything here may be changed
/// while the voice is rendering; the audio thread re-reads it every block.
pub struct VoiceControl {
    /// Unique ID for this voice.
    id: u64,
    /// Scheduled gain automation.
    envelope: Mutex<GainEnvelope>,
    /// Whether the voice restarts when it reaches the end of its buffer.
    looping: AtomicBool,
    /// Sample position at which the voice stops rendering.
    stop_at: AtomicU64,
    /// Set once the voice should be detached from the mixer.
    disconnected: AtomicBool,
}

impl VoiceControl {
    /// Creates a new voice control with the given initial gain automation.
    pub fn new(envelope: GainEnvelope, looping: bool) -> Self {
        Self {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            envelope: Mutex::new(envelope),
            looping: AtomicBool::new(looping),
            stop_at: AtomicU64::new(NO_STOP),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Returns the voice ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Runs `f` with the voice's gain automation locked.
    pub fn with_envelope<R>(&self, f: impl FnOnce(&mut GainEnvelope) -> R) -> R {
        f(&mut self.envelope.lock())
    }

    /// Returns the gain at the given sample position.
    pub fn gain_at(&self, at: u64) -> f32 {
        self.envelope.lock().value_at(at)
    }

    /// Sets whether the voice loops.
    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    /// Returns true if the voice loops.
    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    /// Schedules the voice to stop at the given sample position.
    pub fn stop_at(&self, at: u64) {
        self.stop_at.store(at, Ordering::Relaxed);
    }

    /// Returns the scheduled stop position, if any.
    pub fn scheduled_stop(&self) -> Option<u64> {
        match self.stop_at.load(Ordering::Relaxed) {
            NO_STOP => None,
            at => Some(at),
        }
    }

    /// Detaches the voice from the mixer. Safe to call more than once.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::Relaxed);
    }

    /// Returns true if the voice has been detached.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for VoiceControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceControl")
            .field("id", &self.id)
            .field("looping", &self.is_looping())
            .field("stop_at", &self.scheduled_stop())
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

/// A voice as the audio thread sees it.
struct MixerVoice {
    control: Arc<VoiceControl>,
    buffer: Arc<DecodedBuffer>,
    /// Next frame of the buffer to render.
    position: usize,
    /// Sample position at which rendering begins.
    start_at: u64,
}

/// Core audio mixing logic that's independent of any audio backend.
///
/// The mixer owns the audio clock: the number of frames rendered so far. All gain
/// automation and start/stop positions are expressed on this clock.
pub struct AudioMixer {
    /// Voices currently attached to the output.
    voices: Mutex<Vec<MixerVoice>>,
    /// Channel for adding voices without contending with the render lock.
    voice_tx: Sender<MixerVoice>,
    voice_rx: Receiver<MixerVoice>,
    /// Natural and scheduled ends are reported here by voice ID.
    ended_tx: Sender<u64>,
    ended_rx: Receiver<u64>,
    /// Master gain as f32 bits.
    master_gain: AtomicU32,
    /// Frames rendered so far.
    current_sample: AtomicU64,
    /// Number of output channels.
    num_channels: u16,
    /// Sample rate.
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer.
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded();
        let (ended_tx, ended_rx) = crossbeam_channel::unbounded();
        Self {
            voices: Mutex::new(Vec::new()),
            voice_tx,
            voice_rx,
            ended_tx,
            ended_rx,
            master_gain: AtomicU32::new(1.0f32.to_bits()),
            current_sample: AtomicU64::new(0),
            num_channels: num_channels.max(1),
            sample_rate,
        }
    }

    /// Connects a voice to the output. Rendering begins at `start_at` on the audio clock.
    pub fn add_voice(&self, buffer: Arc<DecodedBuffer>, control: Arc<VoiceControl>, start_at: u64) {
        let voice = MixerVoice {
            control,
            buffer,
            position: 0,
            start_at,
        };
        // The receiver lives as long as the mixer, so this cannot fail.
        let _ = self.voice_tx.send(voice);
    }

    /// Returns a receiver of voice IDs that stopped rendering, either because their
    /// buffer ran out or because they reached their scheduled stop.
    pub fn ended_voices(&self) -> Receiver<u64> {
        self.ended_rx.clone()
    }

    /// Sets the master gain. Applies to every voice from the next rendered frame on.
    pub fn set_master_volume(&self, volume: f32) {
        self.master_gain
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Returns the master gain.
    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_gain.load(Ordering::Relaxed))
    }

    /// Returns the audio clock in frames.
    pub fn current_sample(&self) -> u64 {
        self.current_sample.load(Ordering::Acquire)
    }

    /// Returns the audio clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.current_sample() as f64 / self.sample_rate as f64
    }

    /// Converts a duration to a number of frames at the mixer's sample rate.
    pub fn duration_to_samples(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as u64
    }

    /// Returns the number of voices attached to the output, including ones not yet
    /// picked up by the audio thread.
    pub fn voice_count(&self) -> usize {
        self.voices.lock().len() + self.voice_rx.len()
    }

    /// Mixes `num_frames` frames into `output` (interleaved, `num_channels` wide) and
    /// advances the audio clock.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let channels = self.num_channels as usize;
        let output = &mut output[..num_frames * channels];
        output.fill(0.0);

        let mut voices = self.voices.lock();
        while let Ok(voice) = self.voice_rx.try_recv() {
            voices.push(voice);
        }

        let block_start = self.current_sample();
        let master = self.master_volume();

        voices.retain_mut(|voice| {
            if voice.control.is_disconnected() {
                return false;
            }

            let finished = Self::render_voice(voice, output, channels, block_start, master);
            if finished {
                let _ = self.ended_tx.send(voice.control.id());
            }
            !finished
        });

        self.current_sample
            .fetch_add(num_frames as u64, Ordering::Release);
    }

    /// Mixes one voice into the block. Returns true once the voice has ended.
    fn render_voice(
        voice: &mut MixerVoice,
        output: &mut [f32],
        channels: usize,
        block_start: u64,
        master: f32,
    ) -> bool {
        let total_frames = voice.buffer.frames();
        if total_frames == 0 {
            return true;
        }

        let looping = voice.control.is_looping();
        let stop_at = voice.control.scheduled_stop().unwrap_or(NO_STOP);
        let buffer_channels = voice.buffer.channel_count() as usize;
        let envelope = voice.control.envelope.lock();

        for (frame_index, frame) in output.chunks_exact_mut(channels).enumerate() {
            let now = block_start + frame_index as u64;
            if now < voice.start_at {
                continue;
            }
            if now >= stop_at {
                return true;
            }
            if voice.position >= total_frames {
                if !looping {
                    return true;
                }
                voice.position = 0;
            }

            let gain = envelope.value_at(now) * master;
            for (channel, out) in frame.iter_mut().enumerate() {
                *out += voice.buffer.sample(voice.position, channel % buffer_channels) * gain;
            }
            voice.position += 1;
        }

        voice.position >= total_frames && !looping
    }

    /// Processes multiple frames of audio mixing.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }

    /// Gets the number of output channels.
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for AudioMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("voices", &self.voice_count())
            .field("current_sample", &self.current_sample())
            .field("num_channels", &self.num_channels)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::SILENT_GAIN;

    fn constant_buffer(frames: usize, value: f32) -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::new(vec![value; frames], 1, 1000))
    }

    fn full_gain_voice(looping: bool) -> Arc<VoiceControl> {
        Arc::new(VoiceControl::new(GainEnvelope::new(1.0), looping))
    }

    #[test]
    fn test_mono_voice_fills_all_channels() {
        let mixer = AudioMixer::new(2, 1000);
        mixer.add_voice(constant_buffer(10, 0.5), full_gain_voice(false), 0);

        let frames = mixer.process_frames(4);
        assert_eq!(frames, vec![0.5; 8]);
        assert_eq!(mixer.current_sample(), 4);
    }

    #[test]
    fn test_natural_end_is_reported_once() {
        let mixer = AudioMixer::new(1, 1000);
        let control = full_gain_voice(false);
        mixer.add_voice(constant_buffer(3, 1.0), control.clone(), 0);
        let ended = mixer.ended_voices();

        let frames = mixer.process_frames(5);
        assert_eq!(frames, vec![1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(ended.try_recv().ok(), Some(control.id()));

        mixer.process_frames(5);
        assert!(ended.try_recv().is_err());
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_looping_voice_wraps() {
        let mixer = AudioMixer::new(1, 1000);
        let control = full_gain_voice(true);
        mixer.add_voice(constant_buffer(2, 1.0), control.clone(), 0);

        let frames = mixer.process_frames(7);
        assert_eq!(frames, vec![1.0; 7]);
        assert_eq!(mixer.voice_count(), 1);

        // Turning the loop off lets the current pass finish.
        control.set_looping(false);
        let frames = mixer.process_frames(4);
        assert_eq!(frames, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_scheduled_stop() {
        let mixer = AudioMixer::new(1, 1000);
        let control = full_gain_voice(false);
        mixer.add_voice(constant_buffer(100, 1.0), control.clone(), 0);
        control.stop_at(3);
        let ended = mixer.ended_voices();

        let frames = mixer.process_frames(6);
        assert_eq!(frames, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(ended.try_recv().ok(), Some(control.id()));
    }

    #[test]
    fn test_delayed_start() {
        let mixer = AudioMixer::new(1, 1000);
        mixer.add_voice(constant_buffer(2, 1.0), full_gain_voice(false), 2);

        let frames = mixer.process_frames(5);
        assert_eq!(frames, vec![0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_master_volume_applies_live() {
        let mixer = AudioMixer::new(1, 1000);
        mixer.add_voice(constant_buffer(100, 1.0), full_gain_voice(false), 0);

        assert_eq!(mixer.process_frames(2), vec![1.0, 1.0]);
        mixer.set_master_volume(0.25);
        assert_eq!(mixer.process_frames(2), vec![0.25, 0.25]);

        mixer.set_master_volume(3.0);
        assert_eq!(mixer.master_volume(), 1.0);
    }

    #[test]
    fn test_envelope_shapes_output() {
        let mixer = AudioMixer::new(1, 1000);
        let mut envelope = GainEnvelope::new(SILENT_GAIN);
        envelope.set_value_at(0.0, 0);
        envelope.linear_ramp_to(1.0, 4);
        mixer.add_voice(
            constant_buffer(100, 1.0),
            Arc::new(VoiceControl::new(envelope, false)),
            0,
        );

        let frames = mixer.process_frames(5);
        assert_eq!(frames, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_disconnect_detaches_without_end_event() {
        let mixer = AudioMixer::new(1, 1000);
        let control = full_gain_voice(false);
        mixer.add_voice(constant_buffer(100, 1.0), control.clone(), 0);
        let ended = mixer.ended_voices();

        mixer.process_frames(2);
        control.disconnect();
        control.disconnect();
        assert_eq!(mixer.process_frames(2), vec![0.0, 0.0]);
        assert_eq!(mixer.voice_count(), 0);
        assert!(ended.try_recv().is_err());
    }

    #[test]
    fn test_duration_to_samples() {
        let mixer = AudioMixer::new(2, 48000);
        assert_eq!(mixer.duration_to_samples(Duration::from_millis(100)), 4800);
        assert_eq!(mixer.duration_to_samples(Duration::ZERO), 0);
    }
}
