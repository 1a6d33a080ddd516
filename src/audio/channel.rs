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
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::sample_source::{Frame, SampleSource, Silence};

/// A named playback bus. Sources added to a channel play back to back without
/// gaps; an empty channel produces silence. A channel never reports exhaustion,
/// so the mixer keeps it for the lifetime of the process.
pub struct Channel {
    /// The name the channel is registered under in the mixer.
    name: String,
    /// Sources waiting to be played. The head is the one currently playing.
    queue: Mutex<VecDeque<Arc<dyn SampleSource>>>,
}

impl Channel {
    /// Creates an empty channel.
    pub fn new(name: impl Into<String>) -> Channel {
        Channel {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends sources to the end of the queue.
    pub fn add<I>(&self, sources: I)
    where
        I: IntoIterator<Item = Arc<dyn SampleSource>>,
    {
        self.queue.lock().extend(sources);
    }

    /// Drops everything that has not been played yet, including the rest of the
    /// source currently playing.
    pub fn discard(&self) {
        self.queue.lock().clear();
    }

    /// Returns the number of queued sources, including the one playing.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl SampleSource for Channel {
    fn stream(&self, dst: &mut [Frame]) -> (usize, bool) {
        let mut queue = self.queue.lock();

        let mut filled = 0;
        while filled < dst.len() {
            let remaining = &mut dst[filled..];
            match queue.front() {
                Some(current) => {
                    let (n, exhausted) = current.stream(remaining);
                    filled += n;
                    if exhausted {
                        queue.pop_front();
                    } else if n == 0 {
                        // The head has nothing right now but is not done; pad
                        // with silence rather than spin on it.
                        Silence.stream(remaining);
                        filled = dst.len();
                    }
                }
                None => {
                    Silence.stream(remaining);
                    filled = dst.len();
                }
            }
        }

        (dst.len(), false)
    }

    fn to_channel(self: Arc<Self>) -> Option<Arc<Channel>> {
        Some(self)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("queued", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::{Format, SampleBuffer, SampleSourceTestExt};
    use crate::testutil::constant_buffer;

    fn source(frame: Frame, count: usize) -> Arc<dyn SampleSource> {
        Arc::new(constant_buffer(frame, count).view())
    }

    #[test]
    fn test_single_call_spans_sources() {
        let channel = Channel::new("voice");
        channel.add([source(Frame::mono(0.5), 3), source(Frame::mono(0.25), 2)]);

        let mut dst = [Frame::ZERO; 5];
        assert_eq!(channel.stream(&mut dst), (5, false));
        assert_eq!(
            dst,
            [
                Frame::mono(0.5),
                Frame::mono(0.5),
                Frame::mono(0.5),
                Frame::mono(0.25),
                Frame::mono(0.25),
            ]
        );
        assert!(channel.is_empty());
    }

    #[test]
    fn test_concatenation_independent_of_chunking() {
        let sources = |channel: &Channel| {
            for (i, len) in [7usize, 1, 13, 4].into_iter().enumerate() {
                let frames = (0..len)
                    .map(|j| Frame::new(i as f32, j as f32))
                    .collect::<Vec<_>>();
                let buffer = Arc::new(SampleBuffer::new(
                    frames,
                    Format {
                        sample_rate: 48000,
                        channels: 2,
                    },
                ));
                channel.add([Arc::new(buffer.view()) as Arc<dyn SampleSource>]);
            }
        };

        let reference = Channel::new("reference");
        sources(&reference);
        let expected = reference.collect_frames(27, 27);

        for chunk in [1, 2, 3, 5, 8, 24, 64] {
            let channel = Channel::new("chunked");
            sources(&channel);
            let frames = channel.collect_frames(27, chunk);
            assert_eq!(frames, expected, "chunk size {}", chunk);
        }

        assert_eq!(expected[6], Frame::new(0.0, 6.0));
        assert_eq!(expected[7], Frame::new(1.0, 0.0));
        assert_eq!(expected[8], Frame::new(2.0, 0.0));
        assert_eq!(expected[24], Frame::new(3.0, 3.0));
        // Everything past the queued material is silence.
        assert_eq!(expected[25], Frame::ZERO);
        assert_eq!(expected[26], Frame::ZERO);
    }

    #[test]
    fn test_empty_channel_is_silent_and_never_exhausted() {
        let channel = Channel::new("idle");
        let mut dst = [Frame::mono(9.0); 16];
        assert_eq!(channel.stream(&mut dst), (16, false));
        assert!(dst.iter().all(|f| *f == Frame::ZERO));
    }

    #[test]
    fn test_drained_queue_pads_with_silence() {
        let channel = Channel::new("voice");
        channel.add([source(Frame::mono(0.5), 2)]);

        let mut dst = [Frame::mono(9.0); 4];
        assert_eq!(channel.stream(&mut dst), (4, false));
        assert_eq!(
            dst,
            [
                Frame::mono(0.5),
                Frame::mono(0.5),
                Frame::ZERO,
                Frame::ZERO
            ]
        );
    }

    #[test]
    fn test_discard_silences_until_next_add() {
        let channel = Channel::new("music");
        channel.add([source(Frame::mono(0.5), 100), source(Frame::mono(0.7), 100)]);

        let mut dst = [Frame::ZERO; 10];
        channel.stream(&mut dst);
        assert_eq!(dst[0], Frame::mono(0.5));

        channel.discard();
        assert!(channel.is_empty());
        for _ in 0..3 {
            channel.stream(&mut dst);
            assert!(dst.iter().all(|f| *f == Frame::ZERO));
        }

        channel.add([source(Frame::mono(0.1), 10)]);
        channel.stream(&mut dst);
        assert!(dst.iter().all(|f| *f == Frame::mono(0.1)));
    }

    #[test]
    fn test_stalled_head_is_padded_not_dropped() {
        struct Stalled;
        impl SampleSource for Stalled {
            fn stream(&self, _: &mut [Frame]) -> (usize, bool) {
                (0, false)
            }
        }

        let channel = Channel::new("stalled");
        channel.add([Arc::new(Stalled) as Arc<dyn SampleSource>]);
        let mut dst = [Frame::mono(1.0); 4];
        assert_eq!(channel.stream(&mut dst), (4, false));
        assert!(dst.iter().all(|f| *f == Frame::ZERO));
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_to_channel() {
        let channel: Arc<dyn SampleSource> = Arc::new(Channel::new("bus"));
        let recovered = channel.to_channel().expect("channel");
        assert_eq!(recovered.name(), "bus");

        let view: Arc<dyn SampleSource> = source(Frame::ZERO, 1);
        assert!(view.to_channel().is_none());
    }
}
