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
use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

mod audio;
mod controller;
mod error;
mod library;

pub use self::audio::Audio;
pub use self::controller::Controller;
pub use self::error::ConfigError;
pub use self::library::Library;

/// Prefix for environment variables, e.g. `SOUNDBUS__AUDIO__SAMPLE_RATE`.
pub const ENV_PREFIX: &str = "SOUNDBUS";

/// The complete server configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Soundbus {
    #[serde(default)]
    audio: Audio,
    #[serde(default)]
    library: Library,
    #[serde(default)]
    controller: Controller,
}

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    pub library: Option<String>,
    pub http: Option<String>,
    pub socket: Option<String>,
}

impl Overrides {
    fn apply(
        &self,
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(builder
            .set_override_option("audio.device", self.device.clone())?
            .set_override_option("audio.sample_rate", self.sample_rate.map(i64::from))?
            .set_override_option("library.path", self.library.clone())?
            .set_override_option("controller.http", self.http.clone())?
            .set_override_option("controller.socket", self.socket.clone())?)
    }
}

impl Soundbus {
    /// Loads the configuration. Layers, lowest to highest precedence: built-in
    /// defaults, the YAML file at `path` (if given), `SOUNDBUS__*` environment
    /// variables, then `overrides`.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Soundbus, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Soundbus::finish(builder.add_source(environment()), overrides)
    }

    fn finish(
        builder: ConfigBuilder<DefaultState>,
        overrides: &Overrides,
    ) -> Result<Soundbus, ConfigError> {
        let soundbus = overrides
            .apply(builder)?
            .build()?
            .try_deserialize::<Soundbus>()?;
        soundbus.validate()?;
        Ok(soundbus)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate()?;
        self.library.validate()?;
        self.controller.validate()
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

/// The environment layer. Nested keys are separated by a double underscore.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("library.extensions")
        .with_list_parse_key("library.preload")
}
