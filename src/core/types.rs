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

//! Deterministic core types and canonical encoding helpers.

use bincode::Options;
use ring::digest;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hard cap on the encoded size of a single log entry.
pub const MAX_ENTRY_BYTES: usize = 1024 * 1024;

/// Canonical serialization error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("serialization")]
    Serialize,
    #[error("deserialization")]
    Deserialize,
    #[error("size limit exceeded")]
    TooLarge,
}

/// Canonical bincode options (deterministic).
fn bincode_opts() -> impl Options {
    // Fixint encoding provides a stable integer representation.
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with deterministic rules. Requires deterministic container ordering (use BTreeMap/BTreeSet).
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    // The deserializer limit stops large container lengths from allocating past `max`.
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let d = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    out
}

/// Error parsing a fixed-size hex value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("expected 32 bytes of hex")]
pub struct HexError;

fn parse_hex_32(s: &str) -> Result<[u8; 32], HexError> {
    let bytes = hex::decode(s.trim()).map_err(|_| HexError)?;
    if bytes.len() != 32 {
        return Err(HexError);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Content hash of a log entry (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryHash([u8; 32]);

impl EntryHash {
    /// Construct from raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }
    /// Return bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryHash({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Ed25519 signature bytes (expected 64).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// Ed25519 public key of an entry signer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Parse from 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        parse_hex_32(s).map(Self)
    }
    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Device identifier: SHA-256 of the device's signing key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub [u8; 32]);

impl DeviceId {
    /// Derive the device id for a signing key.
    pub fn of(key: &PublicKey) -> Self {
        Self(sha256(&key.0))
    }
    /// Parse from 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        parse_hex_32(s).map(Self)
    }
    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The key that signs a log entry together with the device it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Ed25519 verification key.
    pub signer_key: PublicKey,
    /// Device derived from `signer_key`.
    pub device_id: DeviceId,
}

impl Identity {
    /// Identity for a signing key.
    pub fn of(signer_key: PublicKey) -> Self {
        Self {
            signer_key,
            device_id: DeviceId::of(&signer_key),
        }
    }

    /// True if `device_id` is the one derived from `signer_key`.
    pub fn is_consistent(&self) -> bool {
        self.device_id == DeviceId::of(&self.signer_key)
    }
}

/// Logical user, owning one or more devices.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Construct from anything string-like.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role name for moderators.
pub const ROLE_MODERATOR: &str = "moderator";
/// Role name for members.
pub const ROLE_MEMBER: &str = "member";

/// Roles, ordered by authority (`Member < Moderator`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// No administrative authority over roles.
    Member,
    /// May grant or revoke any role.
    Moderator,
}

impl Role {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => ROLE_MEMBER,
            Role::Moderator => ROLE_MODERATOR,
        }
    }
}

/// Unknown role name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ROLE_MODERATOR => Ok(Role::Moderator),
            ROLE_MEMBER => Ok(Role::Member),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of operation an entry performs on its log (e.g. `post`, `delete`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKind(pub String);

impl OperationKind {
    /// Construct from anything string-like.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a replicated log.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogAddress(pub String);

impl LogAddress {
    /// Construct from anything string-like.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LogAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for LogAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A frontier of entries; denotes the frontier plus everything it causally follows.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CausalPoint(BTreeSet<EntryHash>);

impl CausalPoint {
    /// The empty point (before any entry).
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }
    /// Frontier hashes.
    pub fn heads(&self) -> &BTreeSet<EntryHash> {
        &self.0
    }
    /// True for the empty frontier.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Number of frontier hashes.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<EntryHash> for CausalPoint {
    fn from_iter<I: IntoIterator<Item = EntryHash>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
