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
//! Resolves sample names to files and turns them into buffers at the output rate.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::audio::sample_source::{
    Decoder, Resampler, SampleBuffer, SampleSourceError, SymphoniaDecoder,
};
use crate::config;

/// Loads named samples from a directory.
#[derive(Clone)]
pub struct SampleLoader {
    /// Directory the names are relative to.
    path: PathBuf,
    /// Extensions tried in order, without leading dots.
    extensions: Vec<String>,
    decoder: Arc<dyn Decoder>,
    resampler: Arc<dyn Resampler>,
    /// Output sample rate everything is converted to.
    sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(
        path: &Path,
        extensions: Vec<String>,
        decoder: Arc<dyn Decoder>,
        resampler: Arc<dyn Resampler>,
        sample_rate: u32,
    ) -> SampleLoader {
        SampleLoader {
            path: path.to_path_buf(),
            extensions,
            decoder,
            resampler,
            sample_rate,
        }
    }

    /// Creates a loader from the library configuration using symphonia and the
    /// configured resampler.
    pub fn from_config(library: &config::Library, sample_rate: u32) -> SampleLoader {
        SampleLoader::new(
            library.path(),
            library.extensions(),
            Arc::new(SymphoniaDecoder),
            library.resampler().build(),
            sample_rate,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Finds the file for `name`, trying each extension in order. Names that
    /// would escape the library directory are treated as missing.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, SampleSourceError> {
        let not_found = || SampleSourceError::NotFound(name.to_string());

        let relative = Path::new(name);
        if name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(not_found());
        }

        self.extensions
            .iter()
            .map(|ext| self.path.join(format!("{}.{}", name, ext)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(not_found)
    }

    /// Loads the sample called `name`.
    pub fn load(&self, name: &str) -> Result<SampleBuffer, SampleSourceError> {
        let path = self.resolve(name)?;
        info!(name, path = ?path, "Loading sample");

        let data = std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SampleSourceError::NotFound(name.to_string()),
            _ => SampleSourceError::Decode(format!("{}: {}", path.display(), e)),
        })?;
        let extension = path.extension().and_then(|ext| ext.to_str());
        let buffer = self.decode(data, extension)?;

        info!(
            name,
            sample_rate = buffer.format().sample_rate,
            duration_ms = buffer.duration().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample loaded"
        );
        Ok(buffer)
    }

    /// Decodes raw audio and converts it to the output rate.
    pub fn decode(
        &self,
        data: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<SampleBuffer, SampleSourceError> {
        let buffer = self.decoder.decode(data, extension)?;
        let source_rate = buffer.format().sample_rate;
        if source_rate == self.sample_rate {
            return Ok(buffer);
        }

        debug!(source_rate, target_rate = self.sample_rate, "Resampling");
        self.resampler.resample(buffer, self.sample_rate)
    }

    /// Lists the sample names available in the library directory, sorted.
    pub fn available(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        self.collect(&self.path, &mut names)?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn collect(&self, dir: &Path, names: &mut Vec<String>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, names)?;
                continue;
            }

            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|e| e == ext));
            if !matches {
                continue;
            }
            let name = path
                .strip_prefix(&self.path)
                .ok()
                .map(|relative| relative.with_extension(""))
                .and_then(|relative| relative.to_str().map(|s| s.replace('\\', "/")));
            if let Some(name) = name {
                names.push(name);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleLoader")
            .field("path", &self.path)
            .field("extensions", &self.extensions)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::{Frame, LinearResampler, ResamplerKind};
    use crate::testutil::write_wav;

    fn loader(dir: &Path, extensions: &[&str], sample_rate: u32) -> SampleLoader {
        SampleLoader::new(
            dir,
            extensions.iter().map(|e| e.to_string()).collect(),
            Arc::new(SymphoniaDecoder),
            Arc::new(LinearResampler),
            sample_rate,
        )
    }

    #[test]
    fn test_load_at_output_rate() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(
            &dir.path().join("kick.wav"),
            &[vec![0.5f32, 0.25], vec![-0.5f32, -0.25]],
            48000,
        );

        let buffer = loader(dir.path(), &["wav"], 48000).load("kick").unwrap();
        assert_eq!(buffer.frames(), &[Frame::new(0.5, -0.5), Frame::new(0.25, -0.25)]);
    }

    #[test]
    fn test_load_resamples() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("tone.wav"), &[vec![0.5f32; 441]], 44100);

        let buffer = loader(dir.path(), &["wav"], 48000).load("tone").unwrap();
        assert_eq!(buffer.format().sample_rate, 48000);
        assert_eq!(buffer.len(), 480);
        assert!((buffer.frames()[100].left - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_missing_sample() {
        let dir = tempfile::tempdir().unwrap();
        let result = loader(dir.path(), &["wav"], 48000).load("nope");
        assert_eq!(result.unwrap_err(), SampleSourceError::NotFound("nope".to_string()));
    }

    #[test]
    fn test_names_cannot_escape_library() {
        let root = tempfile::tempdir().unwrap();
        let library = root.path().join("library");
        std::fs::create_dir(&library).unwrap();
        write_wav(&root.path().join("secret.wav"), &[vec![0.1f32; 4]], 48000);

        let loader = loader(&library, &["wav"], 48000);
        for name in ["../secret", "", "/etc/passwd", "a/../../secret"] {
            assert!(
                loader.resolve(name).unwrap_err().is_not_found(),
                "{:?} resolved",
                name
            );
        }
    }

    #[test]
    fn test_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("drums")).unwrap();
        write_wav(&dir.path().join("drums/snare.wav"), &[vec![0.1f32; 4]], 48000);

        let loader = loader(dir.path(), &["wav"], 48000);
        assert_eq!(
            loader.resolve("drums/snare").unwrap(),
            dir.path().join("drums/snare.wav")
        );
        assert_eq!(loader.available().unwrap(), vec!["drums/snare".to_string()]);
    }

    #[test]
    fn test_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("hat.wav"), &[vec![0.1f32; 4]], 48000);
        std::fs::write(dir.path().join("hat.flac"), b"not really flac").unwrap();

        let wav_first = loader(dir.path(), &["wav", "flac"], 48000);
        assert_eq!(wav_first.resolve("hat").unwrap(), dir.path().join("hat.wav"));
        assert!(wav_first.load("hat").is_ok());

        let flac_first = loader(dir.path(), &["flac", "wav"], 48000);
        assert_eq!(flac_first.resolve("hat").unwrap(), dir.path().join("hat.flac"));
        assert!(matches!(
            flac_first.load("hat"),
            Err(SampleSourceError::Decode(_))
        ));

        let mut names = flac_first.available().unwrap();
        names.sort();
        assert_eq!(names, vec!["hat".to_string()]);
    }

    #[test]
    fn test_from_config() {
        let library = config::Library::new(Path::new("/srv/sounds"));
        let loader = SampleLoader::from_config(&library, 44100);
        assert_eq!(loader.path(), Path::new("/srv/sounds"));
        assert_eq!(loader.sample_rate(), 44100);
        assert_eq!(library.resampler(), ResamplerKind::Sinc);
    }
}
