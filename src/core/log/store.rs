// Copyright (c) 2026 Rolegate
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Local causal store: a content-addressed DAG of verified entries for every log a node follows.
//!
//! Entries may name parents in other logs, so one frontier ([`CausalPoint`]) describes "what was
//! known" across the role ledger, the identity log and governed logs at once.
//!
//! Linearization is Kahn's algorithm over the causal closure of a point, always taking the ready
//! entry with the smallest hash. The result depends only on the closure, never on arrival order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::core::log::entry::{LogEntry, MalformedEntry};
use crate::core::state::persistent_state::{EntryStore, StateError};
use crate::core::types::{CausalPoint, EntryHash, LogAddress};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entry failed structural verification.
    #[error("malformed entry: {0}")]
    Malformed(#[from] MalformedEntry),
    /// Entry references parents this store has not seen.
    #[error("missing parent entries: {0:?}")]
    MissingParents(Vec<EntryHash>),
    /// Persistence failed.
    #[error("persistence: {0}")]
    Persist(#[from] StateError),
}

/// The local replica has not (yet) observed a causal point.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Bounded wait expired.
    #[error("timed out waiting for {missing} entries")]
    Timeout {
        /// Frontier hashes still missing at expiry.
        missing: usize,
    },
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<EntryHash, Arc<LogEntry>>,
    children: BTreeMap<EntryHash, BTreeSet<EntryHash>>,
    heads: BTreeSet<EntryHash>,
    by_log: BTreeMap<LogAddress, BTreeSet<EntryHash>>,
}

/// Content-addressed DAG of verified entries.
pub struct CausalStore {
    inner: RwLock<Inner>,
    persist: Option<EntryStore>,
    version: watch::Sender<u64>,
}

impl Default for CausalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CausalStore {
    /// In-memory store.
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Inner::default()),
            persist: None,
            version,
        }
    }

    /// Open (or create) a sled-backed store and reload its entries in causal order.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let persist = EntryStore::open(path)?;
        let loaded = persist.load_all()?;
        let mut store = Self::new();

        // Parents first. Stored rows come back in hash order, not causal order.
        let mut pending: BTreeMap<EntryHash, LogEntry> =
            loaded.into_iter().map(|e| (e.hash, e)).collect();
        let mut ready: BTreeSet<EntryHash> = pending
            .values()
            .filter(|e| e.parents.iter().all(|p| !pending.contains_key(p)))
            .map(|e| e.hash)
            .collect();
        let mut waiting: BTreeMap<EntryHash, Vec<EntryHash>> = BTreeMap::new();
        for e in pending.values() {
            for p in e.parents.iter().filter(|p| pending.contains_key(p)) {
                waiting.entry(*p).or_default().push(e.hash);
            }
        }

        let mut restored = 0usize;
        while let Some(hash) = ready.pop_first() {
            let Some(entry) = pending.remove(&hash) else { continue };
            match store.insert_inner(entry, false) {
                Ok(_) => restored += 1,
                Err(e) => warn!(%hash, ?e, "dropping stored entry"),
            }
            for child in waiting.remove(&hash).unwrap_or_default() {
                let unblocked = pending
                    .get(&child)
                    .map(|c| c.parents.iter().all(|p| !pending.contains_key(p)))
                    .unwrap_or(false);
                if unblocked {
                    ready.insert(child);
                }
            }
        }
        if !pending.is_empty() {
            warn!(orphaned = pending.len(), "stored entries with unreachable parents were skipped");
        }
        debug!(path, restored, "causal store reopened");

        store.persist = Some(persist);
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Verify and insert an entry. Returns `false` if it was already known.
    pub fn insert(&self, entry: LogEntry) -> Result<bool, StoreError> {
        self.insert_inner(entry, true)
    }

    fn insert_inner(&self, entry: LogEntry, persist: bool) -> Result<bool, StoreError> {
        entry.verify()?;

        let hash = entry.hash;
        {
            let mut inner = self.write();
            if inner.entries.contains_key(&hash) {
                return Ok(false);
            }
            let missing: Vec<EntryHash> = entry
                .parents
                .iter()
                .filter(|p| !inner.entries.contains_key(p))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(StoreError::MissingParents(missing));
            }

            if persist {
                if let Some(db) = &self.persist {
                    db.put_entry(&entry)?;
                }
            }

            for parent in &entry.parents {
                inner.heads.remove(parent);
                inner.children.entry(*parent).or_default().insert(hash);
            }
            inner.heads.insert(hash);
            inner.by_log.entry(entry.log.clone()).or_default().insert(hash);
            debug!(%hash, log = %entry.log, op = %entry.operation, "stored entry");
            inner.entries.insert(hash, Arc::new(entry));
        }

        self.version.send_modify(|v| *v += 1);
        Ok(true)
    }

    /// Look up an entry.
    pub fn get(&self, hash: &EntryHash) -> Option<Arc<LogEntry>> {
        self.read().entries.get(hash).cloned()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// True if no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries stored for `log`.
    pub fn len_of(&self, log: &LogAddress) -> usize {
        self.read().by_log.get(log).map(|s| s.len()).unwrap_or(0)
    }

    /// Monotonic counter bumped on every insert.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Global frontier: entries without children.
    pub fn heads(&self) -> CausalPoint {
        self.read().heads.iter().copied().collect()
    }

    /// Entries of `log` that have no child in the same log.
    pub fn heads_of(&self, log: &LogAddress) -> CausalPoint {
        let inner = self.read();
        let Some(members) = inner.by_log.get(log) else {
            return CausalPoint::empty();
        };
        members
            .iter()
            .filter(|h| {
                inner
                    .children
                    .get(h)
                    .map(|cs| cs.iter().all(|c| !members.contains(c)))
                    .unwrap_or(true)
            })
            .copied()
            .collect()
    }

    /// Frontier hashes not yet stored locally.
    pub fn missing(&self, point: &CausalPoint) -> Vec<EntryHash> {
        let inner = self.read();
        point
            .heads()
            .iter()
            .filter(|h| !inner.entries.contains_key(h))
            .copied()
            .collect()
    }

    /// True once every frontier hash (and so its whole past) is stored.
    pub fn contains_point(&self, point: &CausalPoint) -> bool {
        self.missing(point).is_empty()
    }

    /// Every stored entry at or before `point`. Unknown frontier hashes are ignored.
    pub fn closure(&self, point: &CausalPoint) -> BTreeSet<EntryHash> {
        let inner = self.read();
        Self::closure_inner(&inner, point, &|_| false)
    }

    // Walks parents from `point`, not descending into entries `known` reports.
    fn closure_inner(
        inner: &Inner,
        point: &CausalPoint,
        known: &dyn Fn(&EntryHash) -> bool,
    ) -> BTreeSet<EntryHash> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<EntryHash> = point.heads().iter().copied().collect();
        while let Some(h) = stack.pop() {
            if known(&h) {
                continue;
            }
            let Some(entry) = inner.entries.get(&h) else { continue };
            if !seen.insert(h) {
                continue;
            }
            stack.extend(entry.parents.iter().copied());
        }
        seen
    }

    /// Deterministic total order of the closure of `point`: parents before children,
    /// concurrent entries by ascending hash.
    pub fn linearize(&self, point: &CausalPoint) -> Vec<Arc<LogEntry>> {
        self.linearize_beyond(point, |_| false)
    }

    /// Linearization of the part of `point`'s closure that `known` does not report.
    ///
    /// `known` must describe a set closed under parents (every known entry has known parents).
    /// Known entries are treated as already emitted, so this is the tail of [`Self::linearize`]
    /// whenever the known set is a prefix of that order.
    pub fn linearize_beyond(
        &self,
        point: &CausalPoint,
        known: impl Fn(&EntryHash) -> bool,
    ) -> Vec<Arc<LogEntry>> {
        let inner = self.read();
        let closure = Self::closure_inner(&inner, point, &known);

        let mut indegree: BTreeMap<EntryHash, usize> = BTreeMap::new();
        let mut ready: BTreeSet<EntryHash> = BTreeSet::new();
        for h in &closure {
            let n = inner
                .entries
                .get(h)
                .map(|e| e.parents.iter().filter(|p| closure.contains(p)).count())
                .unwrap_or(0);
            if n == 0 {
                ready.insert(*h);
            } else {
                indegree.insert(*h, n);
            }
        }

        let mut out = Vec::with_capacity(closure.len());
        while let Some(h) = ready.pop_first() {
            if let Some(entry) = inner.entries.get(&h) {
                out.push(entry.clone());
            }
            let Some(children) = inner.children.get(&h) else { continue };
            for child in children.iter().filter(|c| closure.contains(c)) {
                if let Some(n) = indegree.get_mut(child) {
                    *n -= 1;
                    if *n == 0 {
                        indegree.remove(child);
                        ready.insert(*child);
                    }
                }
            }
        }
        out
    }

    /// Linearized entries of a single log at `point`.
    pub fn linearize_log(&self, point: &CausalPoint, log: &LogAddress) -> Vec<Arc<LogEntry>> {
        self.linearize(point)
            .into_iter()
            .filter(|e| &e.log == log)
            .collect()
    }

    /// Wait until `point` is stored locally, at most `timeout`.
    pub async fn wait_for(&self, point: &CausalPoint, timeout: Duration) -> Result<(), SyncError> {
        let mut rx = self.version.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            rx.borrow_and_update();
            let missing = self.missing(point).len();
            if missing == 0 {
                return Ok(());
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                // Sender lives in `self`; a closed channel cannot make progress either.
                Ok(Err(_)) | Err(_) => return Err(SyncError::Timeout { missing }),
            }
        }
    }

    /// Entries persisted on disk for `log` (0 for in-memory stores).
    pub fn persisted_len_of(&self, log: &LogAddress) -> usize {
        self.persist
            .as_ref()
            .map(|db| db.count_for_log(log.as_str()))
            .unwrap_or(0)
    }

    /// Flush persisted entries.
    pub fn flush(&self) -> Result<(), StoreError> {
        if let Some(db) = &self.persist {
            db.flush()?;
        }
        Ok(())
    }
}
