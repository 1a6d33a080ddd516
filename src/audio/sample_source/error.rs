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
/// Errors raised while turning audio data into a playable source. Once a source
/// has been handed to a channel or the mixer, nothing can fail any more.
///
/// The error is `Clone` so that every caller waiting on the same library load
/// receives it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleSourceError {
    #[error("Sample not found: {0}")]
    NotFound(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Resampling failed: {0}Hz -> {1}Hz")]
    ResamplingFailed(u32, u32),
}

impl SampleSourceError {
    /// Returns true if the error means the requested sample does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SampleSourceError::NotFound(_))
    }
}

impl From<symphonia::core::errors::Error> for SampleSourceError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        SampleSourceError::Decode(e.to_string())
    }
}
