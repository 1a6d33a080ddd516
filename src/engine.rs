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
//! The entry points the controllers use to get sound out of the mixer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::audio::sample_source::{BufferView, Playback, SampleSource, SampleSourceError, Tracked};
use crate::audio::{Channel, Mixer};
use crate::samples::{Library, SampleLoader};

/// Mixer keys for one-shots start with this. Channels may not use it.
const ONESHOT_PREFIX: &str = "__oneshot_";

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] SampleSourceError),

    #[error("{0} is not a channel")]
    NotAChannel(String),
}

/// Ties the library, the loader and the mixer together.
pub struct Engine {
    mixer: Arc<Mixer>,
    library: Library,
    loader: SampleLoader,
    /// Counter for anonymous one-shot keys.
    oneshots: AtomicU64,
}

impl Engine {
    /// Creates an engine that plays into `mixer` and loads through `loader`.
    pub fn new(mixer: Arc<Mixer>, loader: SampleLoader) -> Engine {
        Engine {
            mixer,
            library: Library::new(),
            loader,
            oneshots: AtomicU64::new(0),
        }
    }

    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn loader(&self) -> &SampleLoader {
        &self.loader
    }

    /// Returns a fresh view over the named sample, decoding it on first use.
    pub fn load_sample(&self, name: &str) -> Result<BufferView, SampleSourceError> {
        let buffer = self.library.insert(name, || self.loader.load(name))?;
        Ok(buffer.view())
    }

    /// Decodes inline audio into a playable view. Nothing is cached.
    pub fn read_stream(&self, data: Vec<u8>) -> Result<BufferView, SampleSourceError> {
        let buffer = Arc::new(self.loader.decode(data, None)?);
        Ok(buffer.view())
    }

    /// Plays `source`. With a channel name, the source is queued on that channel,
    /// creating the channel if needed. Without one, it plays right away as a
    /// one-shot. The returned handle resolves once the source has finished.
    pub fn play(
        &self,
        source: Arc<dyn SampleSource>,
        channel: Option<&str>,
    ) -> Result<Playback, EngineError> {
        let (tracked, playback) = Tracked::new(source);
        let tracked: Arc<dyn SampleSource> = Arc::new(tracked);

        match channel {
            Some(name) => {
                if name.starts_with(ONESHOT_PREFIX) {
                    return Err(EngineError::NotAChannel(name.to_string()));
                }
                let entry = self.mixer.insert(name, || {
                    info!(channel = name, "Creating channel");
                    Arc::new(Channel::new(name))
                });
                let channel = entry
                    .to_channel()
                    .ok_or_else(|| EngineError::NotAChannel(name.to_string()))?;
                channel.add([tracked]);
                debug!(channel = name, queued = channel.len(), "Queued source");
            }
            None => {
                let key = format!(
                    "{}{}",
                    ONESHOT_PREFIX,
                    self.oneshots.fetch_add(1, Ordering::Relaxed)
                );
                debug!(key, "Playing one-shot");
                self.mixer.set(&key, tracked);
            }
        }

        Ok(playback)
    }

    /// Loads and plays a named sample.
    pub fn play_sample(&self, name: &str, channel: Option<&str>) -> Result<Playback, EngineError> {
        let view = self.load_sample(name)?;
        self.play(Arc::new(view), channel)
    }

    /// Decodes and plays inline audio.
    pub fn play_data(&self, data: Vec<u8>, channel: Option<&str>) -> Result<Playback, EngineError> {
        let view = self.read_stream(data)?;
        self.play(Arc::new(view), channel)
    }

    /// Drops everything queued on the named channel. Returns false if there is
    /// no such channel.
    pub fn discard(&self, channel: &str) -> bool {
        match self.mixer.get(channel).and_then(|entry| entry.to_channel()) {
            Some(channel) => {
                channel.discard();
                info!(channel = channel.name(), "Discarded channel");
                true
            }
            None => false,
        }
    }

    /// Loads the given samples in parallel. Failures are logged and skipped.
    /// Returns how many samples loaded.
    pub fn preload(&self, names: &[String]) -> usize {
        let loaded = names
            .par_iter()
            .filter(|name| match self.load_sample(name) {
                Ok(_) => true,
                Err(e) => {
                    warn!(name = name.as_str(), err = %e, "Unable to preload sample");
                    false
                }
            })
            .count();

        info!(
            loaded,
            requested = names.len(),
            memory_kb = self.library.memory_size() / 1024,
            "Preloaded samples"
        );
        loaded
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("mixer", &self.mixer)
            .field("library", &self.library)
            .field("loader", &self.loader)
            .finish()
    }
}
