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
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{info, span, Level};

use crate::audio::sample_source::{Frame, SampleSource};
use crate::audio::Mixer;
use crate::config;

/// Period used when the configuration does not fix one.
const DEFAULT_BUFFER_SIZE: u32 = 512;

/// A mock device. Pulls from the mixer at the configured rate and throws the
/// audio away, keeping a few statistics for tests.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    buffer_size: u32,
    running: Arc<AtomicBool>,
    frames_rendered: Arc<AtomicU64>,
    /// Largest absolute sample seen so far, as f32 bits.
    peak: Arc<AtomicU32>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(config: &config::Audio) -> Device {
        Device {
            name: config.device().to_string(),
            sample_rate: config.sample_rate(),
            buffer_size: config.buffer_size().unwrap_or(DEFAULT_BUFFER_SIZE),
            running: Arc::new(AtomicBool::new(false)),
            frames_rendered: Arc::new(AtomicU64::new(0)),
            peak: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Returns true if the render thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Returns the number of frames pulled from the mixer so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Returns the largest absolute sample value rendered so far.
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Relaxed))
    }

    /// Stops the render thread after its current period.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl crate::audio::Device for Device {
    fn start(&self, mixer: Arc<Mixer>) -> Result<(), Box<dyn Error>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(format!("mock device {} is already running", self.name).into());
        }

        info!(
            device = self.name,
            sample_rate = self.sample_rate,
            buffer_size = self.buffer_size,
            "Starting output."
        );

        let period =
            Duration::from_secs_f64(f64::from(self.buffer_size) / f64::from(self.sample_rate));
        let device = self.clone();
        thread::Builder::new()
            .name("soundbus-mock-render".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "render (mock)", device = device.name);
                let _enter = span.enter();

                let mut block = vec![Frame::ZERO; device.buffer_size as usize];
                while device.running.load(Ordering::Relaxed) {
                    let (n, _) = mixer.stream(&mut block);
                    let peak = block[..n]
                        .iter()
                        .fold(device.peak(), |peak, f| peak.max(f.left.abs()).max(f.right.abs()));
                    device.peak.store(peak.to_bits(), Ordering::Relaxed);
                    device.frames_rendered.fetch_add(n as u64, Ordering::Relaxed);
                    thread::sleep(period);
                }
                info!("Output stopped.");
            })?;

        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Device as _;
    use crate::testutil::{constant_buffer, eventually};

    #[test]
    fn test_renders_mixer() {
        let device = Device::get(&config::Audio::new("mock").with_buffer_size(64));
        let mixer = Arc::new(Mixer::new());
        mixer.set("tone", Arc::new(constant_buffer(Frame::new(0.25, -0.5), 128).view()));

        device.start(mixer.clone()).unwrap();
        assert!(device.is_running());
        eventually(|| device.frames_rendered() >= 256, "Mock device never rendered");
        eventually(|| !mixer.has("tone"), "Finished source was never removed");
        assert_eq!(device.peak(), 0.5);

        assert!(device.start(mixer.clone()).is_err());
        device.stop();
        assert!(!device.is_running());
    }
}
