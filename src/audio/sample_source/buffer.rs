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
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::frame::Frame;
use super::traits::SampleSource;

/// The format of decoded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count of the audio this buffer was decoded from. Frames are always
    /// stereo, this is kept for reporting.
    pub channels: u16,
}

/// Fully decoded audio held in memory. Immutable once built; playback happens
/// through [`BufferView`] cursors so one buffer can be played any number of times
/// concurrently.
pub struct SampleBuffer {
    frames: Vec<Frame>,
    format: Format,
}

impl SampleBuffer {
    /// Creates a buffer from stereo frames.
    pub fn new(frames: Vec<Frame>, format: Format) -> SampleBuffer {
        SampleBuffer { frames, format }
    }

    /// Creates a buffer from interleaved samples. Mono is spread to both sides,
    /// anything wider than stereo keeps only the first two channels.
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> SampleBuffer {
        let width = channels.max(1) as usize;
        let frames = samples
            .chunks_exact(width)
            .map(|chunk| match chunk {
                [value] => Frame::mono(*value),
                [left, right, ..] => Frame::new(*left, *right),
                [] => Frame::ZERO,
            })
            .collect();

        SampleBuffer {
            frames,
            format: Format {
                sample_rate,
                channels,
            },
        }
    }

    /// Returns the number of frames in the buffer.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Consumes the buffer, returning its frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames.len() as f64 / self.format.sample_rate as f64)
    }

    /// Returns the memory size of the frame data in bytes.
    pub fn memory_size(&self) -> usize {
        self.frames.len() * std::mem::size_of::<Frame>()
    }

    /// Creates a cursor over the whole buffer.
    pub fn view(self: &Arc<Self>) -> BufferView {
        self.slice(0, self.len())
    }

    /// Creates a cursor over frames `[from, to)`. Bounds are clamped to the buffer.
    pub fn slice(self: &Arc<Self>, from: usize, to: usize) -> BufferView {
        let to = to.min(self.len());
        let from = from.min(to);
        BufferView {
            buffer: Arc::clone(self),
            offset: from,
            length: to - from,
            position: AtomicUsize::new(0),
        }
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("frames", &self.frames.len())
            .field("format", &self.format)
            .finish()
    }
}

/// An independent read cursor over a shared [`SampleBuffer`].
pub struct BufferView {
    buffer: Arc<SampleBuffer>,
    offset: usize,
    length: usize,
    position: AtomicUsize,
}

impl BufferView {
    /// Returns the buffer this view reads from.
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Returns how many frames of the view have been read.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    /// Returns how many frames are left to read.
    pub fn remaining(&self) -> usize {
        self.length - self.position()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl SampleSource for BufferView {
    fn stream(&self, dst: &mut [Frame]) -> (usize, bool) {
        let position = self.position.load(Ordering::Acquire);
        let n = (self.length - position).min(dst.len());
        let start = self.offset + position;
        dst[..n].copy_from_slice(&self.buffer.frames[start..start + n]);

        let position = position + n;
        self.position.store(position, Ordering::Release);
        (n, position >= self.length)
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("position", &self.position())
            .finish()
    }
}
