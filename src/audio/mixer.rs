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
// The master bus. Everything that is audible goes through here.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::audio::sample_source::{Frame, SampleSource};

/// Number of frames mixed per pass. Bounds the stack scratch buffer used while
/// streaming so the render path never allocates.
pub const CHUNK_FRAMES: usize = 512;

/// Finished sources the render path can set aside before it has to drop one in
/// place.
const RETIRED_CAPACITY: usize = 64;

/// A keyed set of active sources summed into one output stream. Entries that
/// report exhaustion are removed while streaming; the mixer itself never runs
/// out.
pub struct Mixer {
    /// Active sources, keyed by channel name or one-shot id.
    sources: RwLock<HashMap<String, Arc<dyn SampleSource>>>,
    /// Sources that finished while streaming. Dropping one may free a whole
    /// decoded buffer, so that happens in [`Mixer::reap`] instead of the render
    /// path.
    retired: Mutex<Vec<Arc<dyn SampleSource>>>,
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer {
            sources: RwLock::new(HashMap::new()),
            retired: Mutex::new(Vec::with_capacity(RETIRED_CAPACITY)),
        }
    }
}

impl Mixer {
    /// Creates an empty mixer.
    pub fn new() -> Mixer {
        Mixer::default()
    }

    /// Drops the sources that finished since the last call and returns how many
    /// there were. Called by every mutating operation; the mixer locks are not
    /// held while the sources are dropped.
    pub fn reap(&self) -> usize {
        let retired = {
            let mut retired = self.retired.lock();
            if retired.is_empty() {
                return 0;
            }
            std::mem::replace(&mut *retired, Vec::with_capacity(RETIRED_CAPACITY))
        };
        retired.len()
    }

    /// Returns the entry for `key`, creating it with `factory` if absent. The
    /// factory runs under the mixer lock, so it is called at most once per key
    /// no matter how many callers race on it.
    pub fn insert<F>(&self, key: &str, factory: F) -> Arc<dyn SampleSource>
    where
        F: FnOnce() -> Arc<dyn SampleSource>,
    {
        self.reap();
        let mut sources = self.sources.write();
        if let Some(existing) = sources.get(key) {
            return existing.clone();
        }

        let source = factory();
        sources.insert(key.to_string(), source.clone());
        source
    }

    /// Binds `key` to `source`, replacing whatever was there.
    pub fn set(&self, key: &str, source: Arc<dyn SampleSource>) {
        self.reap();
        self.sources.write().insert(key.to_string(), source);
    }

    /// Returns true if `key` is active.
    pub fn has(&self, key: &str) -> bool {
        self.sources.read().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn SampleSource>> {
        self.sources.read().get(key).cloned()
    }

    /// Removes `key` without waiting for it to finish.
    pub fn remove(&self, key: &str) -> Option<Arc<dyn SampleSource>> {
        self.reap();
        self.sources.write().remove(key)
    }

    /// Returns the number of active entries.
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }

    /// Returns the active keys in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.sources.read().keys().cloned().collect()
    }
}

impl SampleSource for Mixer {
    fn stream(&self, dst: &mut [Frame]) -> (usize, bool) {
        let mut sources = self.sources.write();
        let mut retired = self.retired.lock();
        let mut scratch = [Frame::ZERO; CHUNK_FRAMES];

        for chunk in dst.chunks_mut(CHUNK_FRAMES) {
            chunk.fill(Frame::ZERO);
            let len = chunk.len();

            sources.retain(|_, source| {
                let (n, exhausted) = source.stream(&mut scratch[..len]);
                for (out, frame) in chunk.iter_mut().zip(&scratch[..n.min(len)]) {
                    *out += *frame;
                }
                if exhausted && retired.len() < retired.capacity() {
                    retired.push(source.clone());
                }
                !exhausted
            });
        }

        (dst.len(), false)
    }
}

impl fmt::Debug for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixer")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::audio::channel::Channel;
    use crate::audio::sample_source::SampleSourceTestExt;
    use crate::testutil::constant_buffer;

    /// Produces the same frame forever.
    struct Constant(Frame);

    impl SampleSource for Constant {
        fn stream(&self, dst: &mut [Frame]) -> (usize, bool) {
            dst.fill(self.0);
            (dst.len(), false)
        }
    }

    fn finite(frame: Frame, count: usize) -> Arc<dyn SampleSource> {
        Arc::new(constant_buffer(frame, count).view())
    }

    fn assert_close(actual: &[Frame], expected: &[Frame]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!(
                (a.left - e.left).abs() < 1e-6 && (a.right - e.right).abs() < 1e-6,
                "frame {}: {:?} != {:?}",
                i,
                a,
                e
            );
        }
    }

    fn same(a: &Arc<dyn SampleSource>, b: &Arc<dyn SampleSource>) -> bool {
        Arc::as_ptr(a) as *const u8 == Arc::as_ptr(b) as *const u8
    }

    #[test]
    fn test_exhausted_entry_contributes_then_leaves() {
        let mixer = Mixer::new();
        mixer.set("drums", Arc::new(Constant(Frame::mono(0.1))));
        mixer.set("fx", finite(Frame::mono(0.2), 2));

        let mut dst = [Frame::ZERO; 4];
        assert_eq!(mixer.stream(&mut dst), (4, false));
        assert_close(
            &dst,
            &[
                Frame::mono(0.3),
                Frame::mono(0.3),
                Frame::mono(0.1),
                Frame::mono(0.1),
            ],
        );

        assert!(mixer.has("drums"));
        assert!(!mixer.has("fx"));
        assert_eq!(mixer.len(), 1);
    }

    #[test]
    fn test_sum_is_elementwise() {
        let mixer = Mixer::new();
        mixer.set("a", Arc::new(Constant(Frame::new(0.25, -0.25))));
        mixer.set("b", Arc::new(Constant(Frame::new(0.5, 0.125))));
        mixer.set("c", finite(Frame::new(-0.5, 1.0), 3));

        let frames = mixer.collect_frames(5, 5);
        assert_close(
            &frames,
            &[
                Frame::new(0.25, 0.875),
                Frame::new(0.25, 0.875),
                Frame::new(0.25, 0.875),
                Frame::new(0.75, -0.125),
                Frame::new(0.75, -0.125),
            ],
        );
    }

    #[test]
    fn test_empty_mixer_is_silent() {
        let mixer = Mixer::new();
        let mut dst = [Frame::mono(1.0); 32];
        assert_eq!(mixer.stream(&mut dst), (32, false));
        assert!(dst.iter().all(|f| *f == Frame::ZERO));
    }

    #[test]
    fn test_requests_larger_than_chunk() {
        let mixer = Mixer::new();
        mixer.set("long", finite(Frame::mono(0.5), 600));

        let mut dst = vec![Frame::mono(9.0); CHUNK_FRAMES * 2 + 100];
        assert_eq!(mixer.stream(&mut dst), (dst.len(), false));
        assert!(dst[..600].iter().all(|f| *f == Frame::mono(0.5)));
        assert!(dst[600..].iter().all(|f| *f == Frame::ZERO));
        assert!(mixer.is_empty());
    }

    #[test]
    fn test_insert_returns_existing() {
        let mixer = Mixer::new();
        let calls = AtomicUsize::new(0);
        let factory = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Arc::new(Channel::new("music")) as Arc<dyn SampleSource>
        };

        let first = mixer.insert("music", factory);
        let second = mixer.insert("music", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Arc::new(Channel::new("other")) as Arc<dyn SampleSource>
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(same(&first, &second));
        assert_eq!(
            second.to_channel().map(|c| c.name().to_string()),
            Some("music".to_string())
        );
    }

    #[test]
    fn test_concurrent_insert_runs_factory_once() {
        const THREADS: usize = 16;
        let mixer = Arc::new(Mixer::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles = (0..THREADS)
            .map(|_| {
                let mixer = mixer.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    mixer.insert("voice", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Arc::new(Channel::new("voice")) as Arc<dyn SampleSource>
                    })
                })
            })
            .collect::<Vec<_>>();

        let results = handles
            .into_iter()
            .map(|h| h.join().expect("insert thread panicked"))
            .collect::<Vec<_>>();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| same(r, &results[0])));
        assert_eq!(mixer.len(), 1);
    }

    #[test]
    fn test_entry_recreated_after_exhaustion() {
        let mixer = Mixer::new();
        let calls = AtomicUsize::new(0);
        let factory = || {
            calls.fetch_add(1, Ordering::SeqCst);
            finite(Frame::mono(0.5), 2)
        };

        mixer.insert("blip", factory);
        mixer.collect_frames(4, 4);
        assert!(!mixer.has("blip"));

        mixer.insert("blip", || {
            calls.fetch_add(1, Ordering::SeqCst);
            finite(Frame::mono(0.5), 2)
        });
        assert!(mixer.has("blip"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_replaces() {
        let mixer = Mixer::new();
        mixer.set("a", Arc::new(Constant(Frame::mono(0.1))));
        mixer.set("a", Arc::new(Constant(Frame::mono(0.4))));

        let mut dst = [Frame::ZERO; 2];
        mixer.stream(&mut dst);
        assert_eq!(dst, [Frame::mono(0.4); 2]);
        assert!(mixer.remove("a").is_some());
        assert!(mixer.get("a").is_none());
    }

    #[test]
    fn test_channels_persist_when_drained() {
        let mixer = Mixer::new();
        let channel = Arc::new(Channel::new("voice"));
        channel.add([finite(Frame::mono(0.5), 3)]);
        mixer.set("voice", channel.clone());

        let frames = mixer.collect_frames(8, 3);
        assert_eq!(&frames[..3], &[Frame::mono(0.5); 3]);
        assert!(frames[3..].iter().all(|f| *f == Frame::ZERO));
        assert!(mixer.has("voice"));
        assert!(channel.is_empty());
    }

    #[test]
    fn test_mixer_as_source() {
        let inner = Arc::new(Mixer::new());
        inner.set("a", finite(Frame::mono(0.25), 2));

        let outer = Mixer::new();
        outer.set("sub", inner.clone());
        outer.set("b", finite(Frame::mono(0.5), 4));

        let frames = outer.collect_frames(4, 4);
        assert_eq!(
            frames,
            vec![
                Frame::mono(0.75),
                Frame::mono(0.75),
                Frame::mono(0.5),
                Frame::mono(0.5)
            ]
        );
        assert!(outer.has("sub"));
        assert!(inner.is_empty());
    }

    #[test]
    fn test_finished_sources_dropped_outside_stream() {
        let mixer = Mixer::new();
        let source = finite(Frame::mono(0.5), 4);
        let weak = Arc::downgrade(&source);
        mixer.set("oneshot", source);

        let mut block = [Frame::ZERO; 8];
        mixer.stream(&mut block);
        assert!(!mixer.has("oneshot"));
        assert!(weak.upgrade().is_some());

        assert_eq!(mixer.reap(), 1);
        assert!(weak.upgrade().is_none());
        assert_eq!(mixer.reap(), 0);

        // Producers reap as a side effect.
        let source = finite(Frame::mono(0.5), 4);
        let weak = Arc::downgrade(&source);
        mixer.set("oneshot", source);
        mixer.stream(&mut block);
        mixer.set("next", Arc::new(Constant(Frame::ZERO)));
        assert!(weak.upgrade().is_none());
    }

    /// Keeps a copy of everything pulled through a channel.
    struct Recording {
        channel: Arc<Channel>,
        frames: Mutex<Vec<Frame>>,
    }

    impl SampleSource for Recording {
        fn stream(&self, dst: &mut [Frame]) -> (usize, bool) {
            let (n, exhausted) = self.channel.stream(dst);
            self.frames.lock().extend_from_slice(&dst[..n]);
            (n, exhausted)
        }
    }

    #[test]
    fn test_producers_race_render_loop() {
        const BUSES: usize = 4;
        const SOURCES: usize = 40;

        let mixer = Mixer::new();
        let channels: Vec<Arc<Channel>> = (0..BUSES)
            .map(|i| Arc::new(Channel::new(format!("bus_{}", i))))
            .collect();
        let recordings: Vec<Arc<Recording>> = channels
            .iter()
            .map(|channel| {
                Arc::new(Recording {
                    channel: channel.clone(),
                    frames: Mutex::new(Vec::new()),
                })
            })
            .collect();
        for (i, recording) in recordings.iter().enumerate() {
            mixer.set(&format!("bus_{}", i), recording.clone());
        }
        let scratch = Arc::new(Channel::new("scratch"));
        mixer.set("scratch", scratch.clone());
        let producing = AtomicBool::new(true);

        thread::scope(|s| {
            s.spawn(|| {
                let mut block = [Frame::ZERO; 64];
                let busy = || channels.iter().any(|channel| !channel.is_empty());
                while producing.load(Ordering::SeqCst) || busy() {
                    mixer.stream(&mut block);
                }
            });

            let mut producers = Vec::new();
            for (i, channel) in channels.iter().enumerate() {
                let mixer = &mixer;
                producers.push(s.spawn(move || {
                    let key = format!("bus_{}", i);
                    for k in 0..SOURCES {
                        let frame = Frame::new((k + 1) as f32, (i + 1) as f32);
                        channel.add([finite(frame, k % 7 + 1)]);
                        let entry = mixer.insert(&key, || unreachable!("created up front"));
                        assert!(entry.to_channel().is_none());
                        mixer.set(&format!("shot_{}_{}", i, k), finite(Frame::mono(0.01), 3));
                    }
                }));
            }
            producers.push(s.spawn(|| {
                for _ in 0..200 {
                    scratch.add([finite(Frame::mono(9.0), 5), finite(Frame::mono(9.0), 5)]);
                    scratch.discard();
                    let entry = mixer.insert("scratch", || unreachable!("created up front"));
                    assert!(entry.to_channel().is_some());
                }
            }));

            let results: Vec<_> = producers.into_iter().map(|p| p.join()).collect();
            producing.store(false, Ordering::SeqCst);
            for result in results {
                result.expect("producer panicked");
            }
        });

        for (i, recording) in recordings.iter().enumerate() {
            let expected: Vec<Frame> = (0..SOURCES)
                .flat_map(|k| vec![Frame::new((k + 1) as f32, (i + 1) as f32); k % 7 + 1])
                .collect();
            let played: Vec<Frame> = recording
                .frames
                .lock()
                .iter()
                .copied()
                .filter(|frame| *frame != Frame::ZERO)
                .collect();
            assert_eq!(played, expected, "bus_{} out of order", i);
        }

        assert!(scratch.is_empty());
        let mut block = [Frame::new(1.0, 1.0); 16];
        scratch.stream(&mut block);
        assert_eq!(block, [Frame::ZERO; 16]);
    }
}
