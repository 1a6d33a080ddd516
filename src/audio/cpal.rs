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
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use tracing::{error, info, span, Level};

use crate::audio::sample_source::{Frame, SampleSource};
use crate::audio::thread_priority::RenderPriority;
use crate::audio::{Device as AudioDevice, Mixer};
use crate::config;

/// Frames reserved for the render scratch buffer when the period is not fixed.
const DEFAULT_RESERVED_FRAMES: usize = 4096;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Output sample rate.
    sample_rate: u32,
    /// Fixed period in frames, if configured.
    buffer_size: Option<u32>,
    /// Set once the output stream has been started.
    started: AtomicBool,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
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

    /// Lists cpal devices that have at least one output channel.
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
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device::new(host_id, device, max_channels)?);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    fn new(
        host_id: cpal::HostId,
        device: cpal::Device,
        max_channels: u16,
    ) -> Result<Device, Box<dyn Error>> {
        Ok(Device {
            name: device.name()?,
            max_channels,
            host_id,
            device,
            sample_rate: 0,
            buffer_size: None,
            started: AtomicBool::new(false),
        })
    }

    /// Gets the given cpal device. `default` is the default output of the
    /// default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let mut device = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            let max_channels = device.default_output_config()?.channels();
            Device::new(host.id(), device, max_channels)?
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name))?
        };

        device.sample_rate = config.sample_rate();
        device.buffer_size = config.buffer_size();
        Ok(device)
    }

    /// Builds the output stream for the device's native sample format.
    fn build_stream(
        device: &cpal::Device,
        sample_rate: u32,
        buffer_size: Option<u32>,
        mixer: Arc<Mixer>,
    ) -> Result<cpal::Stream, Box<dyn Error>> {
        let supported = device.default_output_config()?;
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: match buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };
        let reserved = buffer_size.map_or(DEFAULT_RESERVED_FRAMES, |frames| frames as usize);

        info!(
            channels = config.channels,
            sample_rate,
            format = ?supported.sample_format(),
            "Building output stream."
        );

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build::<f32>(device, &config, mixer, reserved)?,
            cpal::SampleFormat::I16 => build::<i16>(device, &config, mixer, reserved)?,
            cpal::SampleFormat::I32 => build::<i32>(device, &config, mixer, reserved)?,
            cpal::SampleFormat::U16 => build::<u16>(device, &config, mixer, reserved)?,
            format => return Err(format!("unsupported sample format {:?}", format).into()),
        };
        Ok(stream)
    }
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
    reserved: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32> + 'static,
{
    device.build_output_stream(
        config,
        render_callback::<T>(mixer, config.channels as usize, reserved),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

/// Creates the device callback. Each call pulls one period from the mixer into
/// a scratch buffer reserved up front and spreads it over the device channels.
fn render_callback<T>(
    mixer: Arc<Mixer>,
    channels: usize,
    reserved: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: SizedSample + FromSample<f32> + 'static,
{
    let channels = channels.max(1);
    let mut frames = vec![Frame::ZERO; reserved];
    let mut priority = RenderPriority::from_env();

    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        priority.apply();

        let needed = data.len() / channels;
        if frames.len() < needed {
            // Only happens if the backend hands us a larger period than asked for.
            frames.resize(needed, Frame::ZERO);
        }
        let block = &mut frames[..needed];
        mixer.stream(block);

        for (out, frame) in data.chunks_mut(channels).zip(block.iter()) {
            write_frame(out, *frame);
        }
    }
}

/// Writes one frame into the interleaved samples of one device frame.
fn write_frame<T>(out: &mut [T], frame: Frame)
where
    T: SizedSample + FromSample<f32>,
{
    match out {
        [] => {}
        [mono] => *mono = T::from_sample((frame.left + frame.right) * 0.5),
        [left, right, rest @ ..] => {
            *left = T::from_sample(frame.left);
            *right = T::from_sample(frame.right);
            rest.fill(T::EQUILIBRIUM);
        }
    }
}

impl AudioDevice for Device {
    fn start(&self, mixer: Arc<Mixer>) -> Result<(), Box<dyn Error>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(format!("device {} is already running", self.name).into());
        }

        let span = span!(Level::INFO, "output (cpal)");
        let _enter = span.enter();

        info!(
            device = self.name,
            sample_rate = self.sample_rate,
            buffer_size = self.buffer_size,
            "Starting output."
        );

        // cpal streams are not Send, so the stream lives on its own thread for the
        // rest of the process.
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let device = self.device.clone();
        let sample_rate = self.sample_rate;
        let buffer_size = self.buffer_size;
        thread::Builder::new()
            .name("soundbus-output".to_string())
            .spawn(move || {
                let stream = match Device::build_stream(&device, sample_rate, buffer_size, mixer)
                    .and_then(|stream| {
                        stream.play()?;
                        Ok(stream)
                    }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive.
                let _stream = stream;
                loop {
                    thread::sleep(Duration::from_secs(1));
                }
            })?;

        match ready_rx.recv()? {
            Ok(()) => {
                info!(device = self.name, "Output stream started.");
                Ok(())
            }
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                Err(format!("unable to start output on {}: {}", self.name, e).into())
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
