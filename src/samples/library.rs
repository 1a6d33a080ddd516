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
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, warn};

use crate::audio::sample_source::{BufferView, SampleBuffer, SampleSourceError};

type LoadResult = Result<Arc<SampleBuffer>, SampleSourceError>;

/// A load in progress. Late callers for the same key wait here instead of
/// decoding again.
struct Pending {
    result: Mutex<Option<LoadResult>>,
    ready: Condvar,
}

impl Pending {
    fn new() -> Pending {
        Pending {
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, result: LoadResult) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> LoadResult {
        let mut result = self.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut result);
        }
    }
}

#[derive(Clone)]
enum Slot {
    Loading(Arc<Pending>),
    Ready(Arc<SampleBuffer>),
}

/// Decode-once cache of named sample buffers. Entries live for the lifetime of
/// the library. Failed loads are not cached, so a later request tries again.
#[derive(Default)]
pub struct Library {
    entries: RwLock<HashMap<String, Slot>>,
}

impl Library {
    /// Creates an empty library.
    pub fn new() -> Library {
        Library::default()
    }

    /// Returns true if `key` has been loaded.
    pub fn has(&self, key: &str) -> bool {
        matches!(self.entries.read().get(key), Some(Slot::Ready(_)))
    }

    /// Returns the buffer for `key` if it has been loaded.
    pub fn get(&self, key: &str) -> Option<Arc<SampleBuffer>> {
        match self.entries.read().get(key) {
            Some(Slot::Ready(buffer)) => Some(buffer.clone()),
            _ => None,
        }
    }

    /// Returns a fresh view over the buffer for `key`, if loaded.
    pub fn stream(&self, key: &str) -> Option<BufferView> {
        self.get(key).map(|buffer| buffer.view())
    }

    /// Binds `key` to `buffer`, replacing anything already there. A load in
    /// flight for the same key hands this buffer to its callers instead of its
    /// own result.
    pub fn set(&self, key: &str, buffer: Arc<SampleBuffer>) {
        self.entries
            .write()
            .insert(key.to_string(), Slot::Ready(buffer));
    }

    /// Returns the buffer for `key`, calling `loader` to produce it if absent.
    ///
    /// At most one loader runs per key. Concurrent callers for the same key wait
    /// for that loader and receive the same buffer, or the same error. The lock
    /// is not held while the loader runs, so other keys are never held up.
    pub fn insert<F>(&self, key: &str, loader: F) -> LoadResult
    where
        F: FnOnce() -> Result<SampleBuffer, SampleSourceError>,
    {
        let pending = {
            let mut entries = self.entries.write();
            let existing = entries.get(key).cloned();
            match existing {
                Some(Slot::Ready(buffer)) => return Ok(buffer),
                Some(Slot::Loading(pending)) => {
                    drop(entries);
                    debug!(key, "Waiting for sample already being loaded");
                    return pending.wait();
                }
                None => {
                    let pending = Arc::new(Pending::new());
                    entries.insert(key.to_string(), Slot::Loading(pending.clone()));
                    pending
                }
            }
        };

        let mut guard = LoadGuard {
            library: self,
            key,
            pending,
            finished: false,
        };
        let result = loader().map(Arc::new);
        guard.finish(result)
    }

    /// Returns the number of loaded samples.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the loaded keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the memory held by loaded samples, in bytes.
    pub fn memory_size(&self) -> usize {
        self.entries
            .read()
            .values()
            .map(|slot| match slot {
                Slot::Ready(buffer) => buffer.memory_size(),
                Slot::Loading(_) => 0,
            })
            .sum()
    }

    fn is_current(slot: Option<&Slot>, pending: &Arc<Pending>) -> bool {
        matches!(slot, Some(Slot::Loading(current)) if Arc::ptr_eq(current, pending))
    }
}

/// Publishes the outcome of a load. If the loader unwinds before finishing, the
/// key is released and waiters get an error rather than hanging.
struct LoadGuard<'a> {
    library: &'a Library,
    key: &'a str,
    pending: Arc<Pending>,
    finished: bool,
}

impl LoadGuard<'_> {
    fn finish(&mut self, result: LoadResult) -> LoadResult {
        self.finished = true;
        let mut entries = self.library.entries.write();
        let published = match result {
            Ok(buffer) => match entries.get(self.key) {
                Some(Slot::Ready(replaced)) => Ok(replaced.clone()),
                _ => {
                    entries.insert(self.key.to_string(), Slot::Ready(buffer.clone()));
                    Ok(buffer)
                }
            },
            Err(e) => match entries.get(self.key) {
                Some(Slot::Ready(replaced)) => Ok(replaced.clone()),
                current => {
                    if Library::is_current(current, &self.pending) {
                        entries.remove(self.key);
                    }
                    Err(e)
                }
            },
        };
        drop(entries);

        self.pending.publish(published.clone());
        published
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(key = self.key, "Sample loader did not finish");
        {
            let mut entries = self.library.entries.write();
            if Library::is_current(entries.get(self.key), &self.pending) {
                entries.remove(self.key);
            }
        }
        self.pending.publish(Err(SampleSourceError::Decode(format!(
            "loading {} was interrupted",
            self.key
        ))));
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("samples", &self.len())
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}
