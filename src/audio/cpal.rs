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
use std::{
    cell::UnsafeCell,
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, span, Level};

use crate::audio::{mixer::AudioMixer, Device as AudioDevice, OutputHandle};
use crate::playsync::CancelHandle;

/// Frames mixed per producer block.
const BLOCK_FRAMES: usize = 512;

/// Single-producer, single-consumer ring of interleaved samples between the mixing
/// thread and the cpal callback.
struct CircularBuffer {
    /// Backing buffer
    buffer: Box<[UnsafeCell<f32>]>,
    /// Capacity (must be power of 2)
    capacity: usize,
    /// Read position (consumer)
    read_pos: AtomicUsize,
    /// Write position (producer)
    write_pos: AtomicUsize,
}

// The producer only writes the region between write_pos and read_pos, and the consumer only
// reads the region between read_pos and write_pos, so the two never touch the same slot.
unsafe impl Sync for CircularBuffer {}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        // Round up to next power of 2 for efficient modulo
        let cap = capacity.next_power_of_two();
        Self {
            buffer: (0..cap).map(|_| UnsafeCell::new(0.0)).collect(),
            capacity: cap,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Get number of samples available to read
    #[inline]
    fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read) & (self.capacity - 1)
    }

    /// Get space available to write
    #[inline]
    fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    /// Writes as many samples as fit. Returns the number written.
    fn write(&self, samples: &[f32]) -> usize {
        let to_write = self.space().min(samples.len());
        let write = self.write_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;

        for (offset, sample) in samples[..to_write].iter().enumerate() {
            // SAFETY: slots between write_pos and read_pos belong to the producer.
            unsafe { *self.buffer[(write + offset) & mask].get() = *sample };
        }

        self.write_pos
            .store((write + to_write) & mask, Ordering::Release);
        to_write
    }

    /// Reads as many samples as are available. Returns the number read.
    fn read(&self, output: &mut [f32]) -> usize {
        let to_read = self.available().min(output.len());
        let read = self.read_pos.load(Ordering::Acquire);
        let mask = self.capacity - 1;

        for (offset, out) in output[..to_read].iter_mut().enumerate() {
            // SAFETY: slots between read_pos and write_pos belong to the consumer.
            *out = unsafe { *self.buffer[(read + offset) & mask].get() };
        }

        self.read_pos
            .store((read + to_read) & mask, Ordering::Release);
        to_read
    }
}

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The number of channels in the device's default output configuration.
    channels: u16,
    /// The sample rate of the device's default output configuration.
    sample_rate: u32,
    /// The sample format of the device's default output configuration.
    sample_format: cpal::SampleFormat,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}

/// f32 callback: read directly into the cpal buffer.
fn create_f32_callback(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let read = ring.read(data);
        // Zero-fill any shortfall
        data[read..].fill(0.0);
    }
}

/// Integer callback: read from ring and convert
fn create_converting_callback<T: cpal::Sample + cpal::FromSample<f32>>(
    ring: Arc<CircularBuffer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut temp: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        temp.resize(data.len(), 0.0);
        let read = ring.read(&mut temp);
        temp[read..].fill(0.0);

        for (dst, &src) in data.iter_mut().zip(temp.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Wraps a cpal device using its default output configuration. Returns None for
    /// devices that can't output audio.
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Result<Option<Device>, Box<dyn Error>> {
        let Ok(config) = device.default_output_config() else {
            return Ok(None);
        };
        #[allow(deprecated)]
        let name = device.name()?;

        Ok(Some(Device {
            name,
            channels: config.channels(),
            sample_rate: config.sample_rate(),
            sample_format: config.sample_format(),
            host_id,
            device,
        }))
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device)? {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. "default" selects the default host's default output.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            return Device::from_cpal(host.id(), device)?
                .ok_or_else(|| "default output device has no output configuration".into());
        }

        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| format!("no device found with name {}", name).into())
    }

    /// Builds and plays the cpal stream, then holds it until cancelled.
    fn run_stream(
        device: cpal::Device,
        config: cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        ring: Arc<CircularBuffer>,
        cancel_handle: CancelHandle,
    ) {
        let on_error = |err| error!("CPAL output stream error: {}", err);
        let stream_result = match sample_format {
            cpal::SampleFormat::F32 => {
                device.build_output_stream(&config, create_f32_callback(ring), on_error, None)
            }
            cpal::SampleFormat::I16 => device.build_output_stream(
                &config,
                create_converting_callback::<i16>(ring),
                on_error,
                None,
            ),
            cpal::SampleFormat::I32 => device.build_output_stream(
                &config,
                create_converting_callback::<i32>(ring),
                on_error,
                None,
            ),
            cpal::SampleFormat::U16 => device.build_output_stream(
                &config,
                create_converting_callback::<u16>(ring),
                on_error,
                None,
            ),
            other => {
                error!(format = ?other, "Unsupported output sample format");
                cancel_handle.cancel();
                return;
            }
        };

        let stream = match stream_result {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to create CPAL stream: {}", e);
                cancel_handle.cancel();
                return;
            }
        };
        if let Err(e) = stream.play() {
            error!("Failed to start CPAL stream: {}", e);
            cancel_handle.cancel();
            return;
        }
        info!("CPAL output stream started successfully");

        // The stream stops when it is dropped.
        cancel_handle.wait();
        debug!("CPAL output stream stopped");
    }
}

impl AudioDevice for Device {
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
            format = ?self.sample_format,
            "Starting output."
        );
        if mixer.num_channels() != self.channels {
            return Err(format!(
                "mixer renders {} channels, audio device {} expects {}",
                mixer.num_channels(),
                self.name,
                self.channels
            )
            .into());
        }

        let cancel_handle = CancelHandle::new();
        let num_channels = self.channels as usize;

        // Roughly 100ms of audio between the mixer and the callback.
        let capacity_samples = (self.sample_rate as usize * num_channels) / 10;
        let ring = Arc::new(CircularBuffer::new(capacity_samples.max(BLOCK_FRAMES * num_channels * 2)));

        let producer_thread = {
            let ring = ring.clone();
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                let span = span!(Level::INFO, "mixer producer");
                let _enter = span.enter();

                let block_samples = BLOCK_FRAMES * num_channels;
                let mut scratch = vec![0.0f32; block_samples];
                while !cancel_handle.is_cancelled() {
                    if ring.space() >= block_samples {
                        mixer.process_into_output(&mut scratch, BLOCK_FRAMES);
                        ring.write(&scratch);
                    } else {
                        // Ring full, yield briefly
                        thread::sleep(Duration::from_micros(500));
                    }
                }
            })
        };

        let output_thread = {
            let device = self.device.clone();
            let config = cpal::StreamConfig {
                channels: self.channels,
                sample_rate: self.sample_rate,
                buffer_size: cpal::BufferSize::Default,
            };
            let sample_format = self.sample_format;
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                let span = span!(Level::INFO, "cpal output");
                let _enter = span.enter();
                Device::run_stream(device, config, sample_format, ring, cancel_handle);
            })
        };

        Ok(OutputHandle::new(
            cancel_handle,
            vec![producer_thread, output_thread],
        ))
    }
}
