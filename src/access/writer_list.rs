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
#![deny(missing_docs)]

//! Signed writer list for allow-list controllers.
//!
//! ## Format (TOML)
//! The list is an **out-of-band** artifact verified locally before use.
//!
//! ```text
//! version = 1
//! log = "rolegate/role-ledger"
//! issued_at_ms = 1730000000000
//! expires_at_ms = 1730003600000
//! writers = ["<device id hex>", "*"]
//! signature_hex = "..."   # Ed25519 signature over canonical bytes (see below)
//! ```
//!
//! ## Canonical bytes
//!
//! ```text
//! v1
//! log=<log>
//! issued_at_ms=<u64>
//! expires_at_ms=<u64>
//! writers
//! <writer1>
//! <writer2>
//! ...
//! ```
//!
//! Writers are deduplicated and sorted before signing. A pinned Ed25519 public key verifies
//! `signature_hex`.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::access::base_list::{BaseListController, Writer};
use crate::core::security::keystore::verify_signature;
use crate::core::types::{LogAddress, PublicKey, Signature};

/// Writer list verification errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriterListError {
    /// Cannot read the file.
    #[error("read writer list")]
    Read,
    /// Cannot parse TOML.
    #[error("parse writer list")]
    Parse,
    /// Pinned public key is invalid.
    #[error("bad writer list public key")]
    BadPubkey,
    /// Signature is invalid.
    #[error("bad writer list signature")]
    BadSignature,
    /// A writer is neither `*` nor a device id.
    #[error("invalid writer {0:?}")]
    InvalidWriter(String),
    /// Unsupported format version.
    #[error("unsupported writer list version")]
    UnsupportedVersion,
    /// Not valid yet.
    #[error("writer list not valid yet")]
    NotYetValid,
    /// Expired.
    #[error("writer list expired")]
    Expired,
    /// Issued too long ago per policy.
    #[error("writer list too old per policy")]
    TooOld,
    /// Bound to another log.
    #[error("writer list log mismatch")]
    LogMismatch,
    /// List has no writers.
    #[error("writer list is empty")]
    Empty,
}

/// Verification policy.
#[derive(Clone, Debug)]
pub struct WriterListPolicy<'a> {
    /// Current time in ms since UNIX epoch. If 0, system time is used.
    pub now_ms: u64,
    /// Max accepted age (now - issued_at_ms) in ms. If 0, no age limit.
    pub max_age_ms: u64,
    /// Grace window in ms after `expires_at_ms`.
    pub grace_ms: u64,
    /// If set, the list must be bound to this log.
    pub expected_log: Option<&'a str>,
}

impl<'a> WriterListPolicy<'a> {
    /// Policy with no age limit and no grace.
    pub fn default_with_now(now_ms: u64) -> Self {
        Self {
            now_ms,
            max_age_ms: 0,
            grace_ms: 0,
            expected_log: None,
        }
    }
}

/// A verified writer list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterList {
    /// Log the list governs.
    pub log: LogAddress,
    /// Issued-at time.
    pub issued_at_ms: u64,
    /// Expiry time.
    pub expires_at_ms: u64,
    /// Writers.
    pub writers: BTreeSet<Writer>,
}

impl WriterList {
    /// Allow-list controller for the listed log.
    pub fn into_controller(self) -> BaseListController {
        BaseListController::new(self.log, self.writers)
    }
}

#[derive(Debug, Deserialize)]
struct WriterListFile {
    version: u32,
    log: String,
    issued_at_ms: u64,
    expires_at_ms: u64,
    #[serde(default)]
    writers: Vec<String>,
    signature_hex: String,
}

/// Canonical signed bytes of a writer list.
pub fn canonical_writer_list_bytes(
    log: &str,
    issued_at_ms: u64,
    expires_at_ms: u64,
    writers: &BTreeSet<Writer>,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"v1\n");
    out.extend_from_slice(format!("log={log}\n").as_bytes());
    out.extend_from_slice(format!("issued_at_ms={issued_at_ms}\n").as_bytes());
    out.extend_from_slice(format!("expires_at_ms={expires_at_ms}\n").as_bytes());
    out.extend_from_slice(b"writers\n");
    for w in writers {
        out.extend_from_slice(w.to_string().as_bytes());
        out.push(b'\n');
    }
    out
}

/// Parse a writer list document (syntax and schema only, no signature check).
pub fn parse_writer_list_toml(raw: &str) -> Result<BTreeSet<Writer>, WriterListError> {
    let file: WriterListFile = toml::from_str(raw).map_err(|_| WriterListError::Parse)?;
    parse_writers(&file.writers)
}

fn parse_writers(raw: &[String]) -> Result<BTreeSet<Writer>, WriterListError> {
    raw.iter()
        .map(|s| {
            s.parse::<Writer>()
                .map_err(|_| WriterListError::InvalidWriter(s.clone()))
        })
        .collect()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Verify a writer list document against a pinned key and policy.
pub fn verify_writer_list(
    raw: &str,
    pubkey_hex: &str,
    policy: &WriterListPolicy<'_>,
) -> Result<WriterList, WriterListError> {
    let pk = PublicKey::from_hex(pubkey_hex).map_err(|_| WriterListError::BadPubkey)?;
    let file: WriterListFile = toml::from_str(raw).map_err(|_| WriterListError::Parse)?;

    if file.version != 1 {
        return Err(WriterListError::UnsupportedVersion);
    }

    let now = if policy.now_ms == 0 { now_ms() } else { policy.now_ms };
    if now < file.issued_at_ms {
        return Err(WriterListError::NotYetValid);
    }
    if now > file.expires_at_ms.saturating_add(policy.grace_ms) {
        return Err(WriterListError::Expired);
    }
    if policy.max_age_ms != 0 && now.saturating_sub(file.issued_at_ms) > policy.max_age_ms {
        return Err(WriterListError::TooOld);
    }
    if let Some(expected) = policy.expected_log {
        if file.log != expected {
            return Err(WriterListError::LogMismatch);
        }
    }

    let writers = parse_writers(&file.writers)?;
    if writers.is_empty() {
        return Err(WriterListError::Empty);
    }

    let sig = hex::decode(file.signature_hex.trim()).map_err(|_| WriterListError::BadSignature)?;
    let msg = canonical_writer_list_bytes(&file.log, file.issued_at_ms, file.expires_at_ms, &writers);
    verify_signature(&pk, &msg, &Signature(sig)).map_err(|_| WriterListError::BadSignature)?;

    Ok(WriterList {
        log: LogAddress::new(file.log),
        issued_at_ms: file.issued_at_ms,
        expires_at_ms: file.expires_at_ms,
        writers,
    })
}

/// Read and verify a writer list file.
pub fn load_and_verify_writer_list(
    path: &str,
    pubkey_hex: &str,
    policy: &WriterListPolicy<'_>,
) -> Result<WriterList, WriterListError> {
    let raw = fs::read_to_string(path).map_err(|_| WriterListError::Read)?;
    verify_writer_list(&raw, pubkey_hex, policy)
}
