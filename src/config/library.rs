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
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::sample_source::ResamplerKind;

const DEFAULT_PATH: &str = "./sounds";
const DEFAULT_EXTENSION: &str = "wav";

/// Where named samples come from and how they are prepared.
#[derive(Deserialize, Clone, Debug)]
pub struct Library {
    /// Directory holding the sample files.
    #[serde(default = "default_path")]
    path: PathBuf,

    /// File extensions tried, in order, when resolving a sample name.
    #[serde(default = "default_extensions")]
    extensions: Vec<String>,

    /// Resampler used when a file's rate differs from the output rate.
    #[serde(default)]
    resampler: ResamplerKind,

    /// Samples decoded at startup.
    #[serde(default)]
    preload: Vec<String>,
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_PATH)
}

fn default_extensions() -> Vec<String> {
    vec![DEFAULT_EXTENSION.to_string()]
}

impl Default for Library {
    fn default() -> Self {
        Library::new(Path::new(DEFAULT_PATH))
    }
}

impl Library {
    /// Creates a library configuration rooted at `path` with default settings.
    pub fn new(path: &Path) -> Library {
        Library {
            path: path.to_path_buf(),
            extensions: default_extensions(),
            resampler: ResamplerKind::default(),
            preload: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the extensions without leading dots.
    pub fn extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect()
    }

    pub fn resampler(&self) -> ResamplerKind {
        self.resampler
    }

    pub fn preload(&self) -> &[String] {
        &self.preload
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions().iter().all(|ext| ext.is_empty()) {
            return Err(ConfigError::Invalid(
                "library.extensions must name at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}
