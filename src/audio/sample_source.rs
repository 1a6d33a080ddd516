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
pub mod buffer;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod resampler;
pub mod silence;
pub mod tracked;
pub mod traits;


// Re-exports for use by other modules
pub use buffer::{BufferView, Format, SampleBuffer};
pub use decoder::{Decoder, SymphoniaDecoder};
pub use error::SampleSourceError;
pub use frame::Frame;
pub use resampler::{LinearResampler, Resampler, ResamplerKind, SincResampler};
pub use silence::Silence;
pub use tracked::{Playback, Tracked};
pub use traits::SampleSource;

#[cfg(test)]
pub use traits::SampleSourceTestExt;
