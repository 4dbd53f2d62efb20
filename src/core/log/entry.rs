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

//! Signed, content-addressed log entries.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::core::{
    log::signing::{entry_hash_v1, SigningError},
    security::keystore::{verify_signature, KeystoreError, SignerBackend},
    types::{
        decode_canonical_limited, encode_canonical, CausalPoint, CodecError, EntryHash, Identity,
        LogAddress, OperationKind, Signature, MAX_ENTRY_BYTES,
    },
};

/// Structural defects that make an entry unusable regardless of policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedEntry {
    /// Entry carries no signer identity.
    #[error("missing identity")]
    MissingIdentity,
    /// Device id does not belong to the signing key.
    #[error("device id does not match signer key")]
    IdentityMismatch,
    /// Parents are not strictly ascending.
    #[error("parents not canonical")]
    UnsortedParents,
    /// Stored hash does not match content.
    #[error("hash mismatch")]
    BadHash,
    /// Signature does not verify against the signer key.
    #[error("bad signature")]
    BadSignature,
    /// Content cannot be canonically encoded.
    #[error("codec")]
    Codec,
}

/// Errors while authoring an entry.
#[derive(Debug, Error)]
pub enum EntryError {
    /// Signing bytes could not be built.
    #[error("signing: {0}")]
    Signing(#[from] SigningError),
    /// Signer backend failed.
    #[error("keystore: {0}")]
    Keystore(#[from] KeystoreError),
    /// Payload could not be encoded.
    #[error("payload: {0}")]
    Payload(#[from] CodecError),
}

/// One entry of a replicated log.
///
/// `parents` are the causal predecessors, possibly in other logs. `hash` covers every field
/// except `signature`, and `signature` is the signer's Ed25519 signature over `hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log this entry is appended to.
    pub log: LogAddress,
    /// Operation kind, matched against controller policy.
    pub operation: OperationKind,
    /// Opaque payload (typed records are canonical bincode).
    pub payload: Vec<u8>,
    /// Causal predecessors, strictly ascending.
    pub parents: Vec<EntryHash>,
    /// Signer identity.
    pub identity: Option<Identity>,
    /// Content hash.
    pub hash: EntryHash,
    /// Signature over `hash`.
    pub signature: Signature,
}

impl LogEntry {
    /// Create a new signed entry.
    pub fn new_signed<B: SignerBackend + ?Sized>(
        log: LogAddress,
        operation: OperationKind,
        payload: Vec<u8>,
        parents: impl IntoIterator<Item = EntryHash>,
        signer: &B,
    ) -> Result<Self, EntryError> {
        let parents: Vec<EntryHash> = parents.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let identity = Some(signer.identity());
        let hash = entry_hash_v1(&log, &operation, &payload, &parents, &identity)?;
        let signature = signer.sign(hash.as_bytes())?;
        Ok(Self {
            log,
            operation,
            payload,
            parents,
            identity,
            hash,
            signature,
        })
    }

    /// Create a signed entry carrying a canonically encoded record.
    pub fn new_record<T: Serialize, B: SignerBackend + ?Sized>(
        log: LogAddress,
        operation: OperationKind,
        record: &T,
        parents: impl IntoIterator<Item = EntryHash>,
        signer: &B,
    ) -> Result<Self, EntryError> {
        let payload = encode_canonical(record)?;
        Self::new_signed(log, operation, payload, parents, signer)
    }

    /// Causal point this entry was authored at (its parents).
    pub fn point(&self) -> CausalPoint {
        self.parents.iter().copied().collect()
    }

    /// True if the entry has no causal predecessor.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Recompute the content hash.
    pub fn compute_hash(&self) -> Result<EntryHash, MalformedEntry> {
        entry_hash_v1(&self.log, &self.operation, &self.payload, &self.parents, &self.identity)
            .map_err(|_| MalformedEntry::Codec)
    }

    /// Verify structure, hash and signature. Returns the signer identity.
    pub fn verify(&self) -> Result<&Identity, MalformedEntry> {
        let identity = self.identity.as_ref().ok_or(MalformedEntry::MissingIdentity)?;
        if !identity.is_consistent() {
            return Err(MalformedEntry::IdentityMismatch);
        }
        if self.parents.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MalformedEntry::UnsortedParents);
        }
        let expected = self.compute_hash()?;
        if !bool::from(expected.as_bytes()[..].ct_eq(&self.hash.as_bytes()[..])) {
            return Err(MalformedEntry::BadHash);
        }
        verify_signature(&identity.signer_key, self.hash.as_bytes(), &self.signature)
            .map_err(|_| MalformedEntry::BadSignature)?;
        Ok(identity)
    }

    /// Decode the payload as a canonical record.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        decode_canonical_limited(&self.payload, MAX_ENTRY_BYTES)
    }

    /// Canonical wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        encode_canonical(self)
    }

    /// Decode wire bytes (size-capped). Does not verify.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        decode_canonical_limited(bytes, MAX_ENTRY_BYTES)
    }
}
