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

//! Decoding of in-memory audio files into playable buffers.
//!
//! Sounds are decoded entirely into memory when they are loaded or lazily
//! re-resolved, so triggering a cell never touches the decoder.

use std::io::Cursor;
use std::time::Duration;

use rubato::{
    ResampleError, Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

/// Error types for decoding audio bytes.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Audio stream error: {0}")]
    Audio(#[from] SymphoniaError),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Sample rate not specified")]
    MissingSampleRate,

    #[error("Audio stream contains no samples")]
    Empty,

    #[error("Resampling from {0} Hz to {1} Hz failed")]
    Resampling(u32, u32),
}

/// Decoded audio held in memory as interleaved f32 samples.
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    samples: Vec<f32>,
    channel_count: u16,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channel_count as usize
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the playback duration.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Returns the sample for the given frame and channel.
    #[inline]
    pub(crate) fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples[frame * self.channel_count as usize + channel]
    }
}

/// Decodes an audio file held in memory (WAV, MP3, FLAC, OGG, ...) and resamples it
/// to `target_sample_rate` when the rates differ.
pub fn decode_audio(bytes: Vec<u8>, target_sample_rate: u32) -> Result<DecodedBuffer, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let source_sample_rate = params.sample_rate.ok_or(DecodeError::MissingSampleRate)?;
    let mut channel_count = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A single bad packet is skipped, the rest of the stream is still usable.
                warn!(error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        channel_count = spec.channels.count() as u16;
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if samples.is_empty() || channel_count == 0 {
        return Err(DecodeError::Empty);
    }

    let samples = if source_sample_rate != target_sample_rate {
        debug!(
            source_rate = source_sample_rate,
            target_rate = target_sample_rate,
            "Resampling decoded audio"
        );
        resample(
            &samples,
            channel_count,
            source_sample_rate,
            target_sample_rate,
        )?
    } else {
        samples
    };

    Ok(DecodedBuffer::new(
        samples,
        channel_count,
        target_sample_rate,
    ))
}

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Resamples interleaved samples with a sinc resampler. The resampler's output delay is
/// trimmed so the result lines up with the source and holds exactly as many frames as the
/// rate ratio calls for.
fn resample(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, DecodeError> {
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let ratio = target_rate as f64 / source_rate as f64;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;
    let failed = |_: ResampleError| DecodeError::Resampling(source_rate, target_rate);

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, channels)
            .map_err(|_| DecodeError::Resampling(source_rate, target_rate))?;

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| {
            samples
                .iter()
                .skip(channel)
                .step_by(channels)
                .copied()
                .collect()
        })
        .collect();

    let delay = resampler.output_delay();
    let needed = delay + target_frames;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(needed); channels];
    let append = |chunk: Vec<Vec<f32>>, output: &mut Vec<Vec<f32>>| -> usize {
        let frames = chunk.first().map(|c| c.len()).unwrap_or(0);
        for (out, part) in output.iter_mut().zip(chunk) {
            out.extend(part);
        }
        frames
    };

    let mut position = 0;
    while source_frames - position >= resampler.input_frames_next() {
        let next = resampler.input_frames_next();
        let block: Vec<&[f32]> = planar
            .iter()
            .map(|ch| &ch[position..position + next])
            .collect();
        let chunk = resampler.process(&block, None).map_err(failed)?;
        append(chunk, &mut output);
        position += next;
    }

    if position < source_frames {
        let block: Vec<&[f32]> = planar.iter().map(|ch| &ch[position..]).collect();
        let chunk = resampler
            .process_partial(Some(block.as_slice()), None)
            .map_err(failed)?;
        append(chunk, &mut output);
    }

    // Flush the filter tail until the delayed output covers the whole clip.
    while output.first().map(|c| c.len()).unwrap_or(0) < needed {
        let chunk = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(failed)?;
        if append(chunk, &mut output) == 0 {
            break;
        }
    }

    let available = output
        .first()
        .map(|c| c.len().saturating_sub(delay))
        .unwrap_or(0);
    let frames = target_frames.min(available);
    let mut interleaved = Vec::with_capacity(frames * channels);
    for frame in delay..delay + frames {
        for channel in &output {
            interleaved.push(channel[frame]);
        }
    }

    Ok(interleaved)
}
