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

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::frame::Frame;
use super::traits::SampleSource;

/// Wraps a source and signals a [`Playback`] handle once the source is exhausted.
pub struct Tracked {
    inner: Arc<dyn SampleSource>,
    done: Mutex<Option<oneshot::Sender<()>>>,
}

impl Tracked {
    /// Wraps the given source, returning the wrapper and its completion handle.
    pub fn new(inner: Arc<dyn SampleSource>) -> (Tracked, Playback) {
        let (tx, rx) = oneshot::channel();
        (
            Tracked {
                inner,
                done: Mutex::new(Some(tx)),
            },
            Playback { rx },
        )
    }
}

impl SampleSource for Tracked {
    fn stream(&self, dst: &mut [Frame]) -> (usize, bool) {
        let (n, exhausted) = self.inner.stream(dst);
        if exhausted {
            if let Some(tx) = self.done.lock().take() {
                // The receiver may be gone already; nobody is waiting then.
                let _ = tx.send(());
            }
        }
        (n, exhausted)
    }
}

/// Completion handle for a source handed to the mixer.
#[derive(Debug)]
pub struct Playback {
    rx: oneshot::Receiver<()>,
}

impl Playback {
    /// Waits until playback ends. Returns true if the source played to the end,
    /// false if it was dropped first (for example by discarding its channel).
    pub async fn finished(self) -> bool {
        self.rx.await.is_ok()
    }

    /// Blocking variant of [`Playback::finished`] for non-async callers.
    pub fn wait(self) -> bool {
        self.rx.blocking_recv().is_ok()
    }

    /// Returns true if playback ended, without waiting.
    pub fn try_finished(&mut self) -> Option<bool> {
        match self.rx.try_recv() {
            Ok(()) => Some(true),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(false),
        }
    }
}
