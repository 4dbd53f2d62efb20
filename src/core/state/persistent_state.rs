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

//! Persistent entry storage using sled.
//!
//! Only verified log entries are stored. Derived state (device directories, role states) is
//! never written here; it is rebuilt from the entries after reopening.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use thiserror::Error;
use tracing::warn;

use crate::core::log::entry::LogEntry;

const ENTRIES_TREE: &str = "entries";
const LOG_INDEX_TREE: &str = "log_index";

/// State errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// Database or tree could not be opened.
    #[error("db open")]
    DbOpen,
    /// Read, write or flush failed.
    #[error("db io")]
    DbIo,
    /// Entry could not be encoded.
    #[error("codec")]
    Codec,
}

/// sled-backed entry store.
///
/// `entries` maps entry hash to canonical entry bytes. `log_index` maps
/// `log address || 0x00 || hash` to nothing and lets a node count per-log entries without
/// decoding everything.
#[derive(Clone)]
pub struct EntryStore {
    db: sled::Db,
    entries: sled::Tree,
    log_index: sled::Tree,
}

fn index_key(entry: &LogEntry) -> Vec<u8> {
    let log = entry.log.as_str().as_bytes();
    let mut key = Vec::with_capacity(log.len() + 1 + 32);
    key.extend_from_slice(log);
    key.push(0);
    key.extend_from_slice(entry.hash.as_bytes());
    key
}

impl EntryStore {
    /// Open sled DB at path (directory).
    pub fn open(path: &str) -> Result<Self, StateError> {
        let db = sled::open(path).map_err(|_| StateError::DbOpen)?;
        let entries = db.open_tree(ENTRIES_TREE).map_err(|_| StateError::DbOpen)?;
        let log_index = db.open_tree(LOG_INDEX_TREE).map_err(|_| StateError::DbOpen)?;
        Ok(Self { db, entries, log_index })
    }

    /// Store an entry and its log index row atomically.
    pub fn put_entry(&self, entry: &LogEntry) -> Result<(), StateError> {
        let bytes = entry.to_bytes().map_err(|_| StateError::Codec)?;
        let key = index_key(entry);
        let res: Result<(), TransactionError<StateError>> =
            (&self.entries, &self.log_index).transaction(|(entries, index)| {
                entries
                    .insert(&entry.hash.as_bytes()[..], bytes.as_slice())
                    .map_err(|_| ConflictableTransactionError::Abort(StateError::DbIo))?;
                index
                    .insert(key.as_slice(), &[] as &[u8])
                    .map_err(|_| ConflictableTransactionError::Abort(StateError::DbIo))?;
                Ok(())
            });

        match res {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(_)) => Err(StateError::DbIo),
        }
    }

    /// Number of stored entries for `log`.
    pub fn count_for_log(&self, log: &str) -> usize {
        let mut prefix = log.as_bytes().to_vec();
        prefix.push(0);
        self.log_index.scan_prefix(prefix).filter(|r| r.is_ok()).count()
    }

    /// Load every stored entry. Undecodable rows are skipped and reported.
    pub fn load_all(&self) -> Result<Vec<LogEntry>, StateError> {
        let mut out = Vec::new();
        for item in self.entries.iter() {
            let (key, value) = item.map_err(|_| StateError::DbIo)?;
            match LogEntry::from_bytes(&value) {
                Ok(entry) => out.push(entry),
                Err(e) => warn!(key = %hex::encode(&key), ?e, "skipping undecodable stored entry"),
            }
        }
        Ok(out)
    }

    /// Flush to disk.
    pub fn flush(&self) -> Result<(), StateError> {
        self.db.flush().map(|_| ()).map_err(|_| StateError::DbIo)
    }
}
