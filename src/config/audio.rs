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
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// The output device configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device. `default` picks the host's default output, names
    /// starting with `mock` pick the mock device.
    #[serde(default = "default_device")]
    device: String,

    /// Output sample rate in Hz. Everything in the library is resampled to it.
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,

    /// Device period in frames. When unset the backend decides.
    buffer_size: Option<u32>,
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new(DEFAULT_DEVICE)
    }
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: None,
        }
    }

    /// Returns a copy with the given buffer size.
    pub fn with_buffer_size(mut self, buffer_size: u32) -> Audio {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the output sample rate (default: 48000).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the device period in frames, if fixed.
    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "audio.sample_rate must be greater than zero".to_string(),
            ));
        }
        if self.buffer_size == Some(0) {
            return Err(ConfigError::Invalid(
                "audio.buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
