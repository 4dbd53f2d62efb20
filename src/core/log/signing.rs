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

//! Domain-separated signing bytes for log entries.

use crate::core::types::{encode_canonical, sha256, EntryHash, Identity, LogAddress, OperationKind};
use serde::Serialize;
use thiserror::Error;

const ENTRY_DOMAIN_V1: &[u8] = b"Rolegate-Entry-v1";

/// Signing error.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Canonical encoding failed.
    #[error("codec")]
    Codec,
}

#[derive(Serialize)]
struct SignedContent<'a> {
    log: &'a LogAddress,
    operation: &'a OperationKind,
    payload: &'a [u8],
    parents: &'a [EntryHash],
    identity: &'a Option<Identity>,
}

/// Entry signing payload: domain || canonical(log, operation, payload, parents, identity)
///
/// `parents` must already be sorted and deduplicated so that the same causal predecessors
/// always produce the same bytes.
pub fn entry_signing_bytes_v1(
    log: &LogAddress,
    operation: &OperationKind,
    payload: &[u8],
    parents: &[EntryHash],
    identity: &Option<Identity>,
) -> Result<Vec<u8>, SigningError> {
    let content = SignedContent {
        log,
        operation,
        payload,
        parents,
        identity,
    };
    let body = encode_canonical(&content).map_err(|_| SigningError::Codec)?;
    let mut out = Vec::with_capacity(ENTRY_DOMAIN_V1.len() + body.len());
    out.extend_from_slice(ENTRY_DOMAIN_V1);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Content hash of an entry: SHA-256 of its signing bytes.
pub fn entry_hash_v1(
    log: &LogAddress,
    operation: &OperationKind,
    payload: &[u8],
    parents: &[EntryHash],
    identity: &Option<Identity>,
) -> Result<EntryHash, SigningError> {
    let bytes = entry_signing_bytes_v1(log, operation, payload, parents, identity)?;
    Ok(EntryHash::from_bytes(sha256(&bytes)))
}
