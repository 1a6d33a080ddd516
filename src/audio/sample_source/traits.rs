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
use std::sync::Arc;

use super::frame::Frame;
use crate::audio::channel::Channel;

/// A source of stereo frames that can be pulled by a mixer or a channel.
///
/// Sources are shared between producer threads and the render path, so pulling
/// takes `&self` and implementations keep their cursor state behind interior
/// mutability.
pub trait SampleSource: Send + Sync {
    /// Pulls up to `dst.len()` frames into `dst`.
    ///
    /// Returns the number of frames written to the front of `dst` and whether the
    /// source is exhausted. Frames past the returned count are left untouched.
    /// A source may write fewer frames than requested, or none at all, without
    /// being exhausted. Once exhausted, a source never produces frames again.
    fn stream(&self, dst: &mut [Frame]) -> (usize, bool);

    /// Returns the channel behind this source, if it is one.
    fn to_channel(self: Arc<Self>) -> Option<Arc<Channel>> {
        None
    }
}

/// Forwarding implementation so that shared sources can be nested.
impl<S: SampleSource + ?Sized> SampleSource for Arc<S> {
    fn stream(&self, dst: &mut [Frame]) -> (usize, bool) {
        (**self).stream(dst)
    }
}

#[cfg(test)]
pub trait SampleSourceTestExt {
    /// Pulls `frames` frames in chunks of `chunk` and returns everything written.
    fn collect_frames(&self, frames: usize, chunk: usize) -> Vec<Frame>;

    /// Pulls until the source reports exhausted and returns everything written.
    fn drain(&self) -> Vec<Frame>;
}

#[cfg(test)]
impl<S: SampleSource + ?Sized> SampleSourceTestExt for S {
    fn collect_frames(&self, frames: usize, chunk: usize) -> Vec<Frame> {
        let mut collected = Vec::with_capacity(frames);
        let mut scratch = vec![Frame::ZERO; chunk.max(1)];
        while collected.len() < frames {
            let want = (frames - collected.len()).min(scratch.len());
            let (n, _) = self.stream(&mut scratch[..want]);
            collected.extend_from_slice(&scratch[..n]);
            if n == 0 {
                break;
            }
        }
        collected
    }

    fn drain(&self) -> Vec<Frame> {
        let mut collected = Vec::new();
        let mut scratch = [Frame::ZERO; 64];
        loop {
            let (n, exhausted) = self.stream(&mut scratch);
            collected.extend_from_slice(&scratch[..n]);
            if exhausted {
                return collected;
            }
        }
    }
}
