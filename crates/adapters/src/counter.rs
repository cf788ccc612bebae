// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared counter stores backing the resource token bucket.
//!
//! The token manager only needs three primitives: create-if-absent, read,
//! and compare-and-swap. Any store offering them atomically across every
//! process sharing the bucket is a valid backend.

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from a counter store.
#[derive(Debug, Error)]
pub enum CounterStoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    #[error("counter '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Atomic integer counters keyed by name.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Set `key` to `value` unless it already exists. Returns true if created.
    async fn init_if_absent(&self, key: &str, value: i64) -> Result<bool, CounterStoreError>;

    async fn get(&self, key: &str) -> Result<Option<i64>, CounterStoreError>;

    /// Replace `expected` with `new` atomically. Returns false when the
    /// current value differs (or the key is missing).
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: i64,
        new: i64,
    ) -> Result<bool, CounterStoreError>;
}

/// In-process store. Shared by clones; scoped to one process.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    values: Arc<Mutex<HashMap<String, i64>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional write, for seeding and tests.
    pub fn set(&self, key: &str, value: i64) {
        self.values.lock().insert(key.to_string(), value);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn init_if_absent(&self, key: &str, value: i64) -> Result<bool, CounterStoreError> {
        let mut values = self.values.lock();
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value);
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, CounterStoreError> {
        Ok(self.values.lock().get(key).copied())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: i64,
        new: i64,
    ) -> Result<bool, CounterStoreError> {
        let mut values = self.values.lock();
        match values.get_mut(key) {
            Some(current) if *current == expected => {
                *current = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Store that keeps each counter in `<dir>/<key>.count`.
///
/// Every operation holds an exclusive `fs2` lock on `<dir>/<key>.lock`, so
/// all processes on the host pointing at the same directory share one
/// bucket.
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    dir: PathBuf,
}

impl FileCounterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `f` with the key's lock held, on the blocking pool.
    async fn with_lock<T, F>(&self, key: &str, f: F) -> Result<T, CounterStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path, &str) -> Result<T, CounterStoreError> + Send + 'static,
    {
        let dir = self.dir.clone();
        let key = sanitize_key(key);
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            let lock = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(dir.join(format!("{}.lock", key)))?;
            lock.lock_exclusive()?;
            let result = f(&dir.join(format!("{}.count", key)), &key);
            let _ = FileExt::unlock(&lock);
            result
        })
        .await
        .map_err(|e| CounterStoreError::Unavailable(format!("blocking task failed: {}", e)))?
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn read_count(path: &Path, key: &str) -> Result<Option<i64>, CounterStoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    text.trim().parse::<i64>().map(Some).map_err(|e| CounterStoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn write_count(path: &Path, value: i64) -> Result<(), CounterStoreError> {
    let tmp = path.with_extension("count.tmp");
    let mut file = std::fs::File::create(&tmp)?;
    writeln!(file, "{}", value)?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn init_if_absent(&self, key: &str, value: i64) -> Result<bool, CounterStoreError> {
        self.with_lock(key, move |path, key| {
            if read_count(path, key)?.is_some() {
                return Ok(false);
            }
            write_count(path, value)?;
            Ok(true)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, CounterStoreError> {
        self.with_lock(key, read_count).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: i64,
        new: i64,
    ) -> Result<bool, CounterStoreError> {
        self.with_lock(key, move |path, key| {
            if read_count(path, key)? != Some(expected) {
                return Ok(false);
            }
            write_count(path, new)?;
            Ok(true)
        })
        .await
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{CounterStore, CounterStoreError, MemoryCounterStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeCounterState {
        unavailable: bool,
        conflicts: u32,
        cas_calls: u32,
    }

    /// Memory store with switchable outages and injected CAS conflicts.
    #[derive(Clone, Default)]
    pub struct FakeCounterStore {
        store: MemoryCounterStore,
        inner: Arc<Mutex<FakeCounterState>>,
    }

    impl FakeCounterStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every call fail with `Unavailable` until switched back.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.inner.lock().unavailable = unavailable;
        }

        /// Make the next `n` compare-and-swap calls lose the race.
        pub fn inject_conflicts(&self, n: u32) {
            self.inner.lock().conflicts = n;
        }

        pub fn cas_calls(&self) -> u32 {
            self.inner.lock().cas_calls
        }

        /// Overwrite a counter directly, bypassing CAS.
        pub fn force(&self, key: &str, value: i64) {
            self.store.set(key, value);
        }

        fn check(&self) -> Result<(), CounterStoreError> {
            if self.inner.lock().unavailable {
                return Err(CounterStoreError::Unavailable("injected outage".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CounterStore for FakeCounterStore {
        async fn init_if_absent(&self, key: &str, value: i64) -> Result<bool, CounterStoreError> {
            self.check()?;
            self.store.init_if_absent(key, value).await
        }

        async fn get(&self, key: &str) -> Result<Option<i64>, CounterStoreError> {
            self.check()?;
            self.store.get(key).await
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            expected: i64,
            new: i64,
        ) -> Result<bool, CounterStoreError> {
            self.check()?;
            {
                let mut inner = self.inner.lock();
                inner.cas_calls += 1;
                if inner.conflicts > 0 {
                    inner.conflicts -= 1;
                    return Ok(false);
                }
            }
            self.store.compare_and_swap(key, expected, new).await
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCounterStore;

#[cfg(test)]
#[path = "counter_tests.rs"]
mod tests;
