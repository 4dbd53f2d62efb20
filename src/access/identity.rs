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

//! Signer → account resolution from signed device-linking records.
//!
//! Rules applied, in linearized order, to every record on the identity log:
//! - the first link of an unseen account must be signed by the device being linked;
//! - later links must be signed by a device currently linked to that account;
//! - unlinks must be signed by a device currently linked to that account;
//! - a device is linked to at most one account, and an unlinked device stays revoked.
//!
//! Records that break a rule have no effect. Resolution is always "as of" a causal point.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::core::{
    log::entry::{EntryError, LogEntry},
    log::store::CausalStore,
    security::keystore::SignerBackend,
    types::{AccountId, CausalPoint, DeviceId, EntryHash, Identity, LogAddress, OperationKind},
};

/// Operation kind of identity-log entries.
pub const OP_DEVICE_LINK: &str = "device-link";

/// Link or unlink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkAction {
    /// Add the device to the account.
    Link,
    /// Remove the device from the account, permanently.
    Unlink,
}

/// Device-linking record carried by identity-log entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLinkRecord {
    /// Account the device joins or leaves.
    pub account: AccountId,
    /// Device being linked or unlinked.
    pub device: DeviceId,
    /// What happens.
    pub action: LinkAction,
}

/// Why a link record had no effect.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LinkRejection {
    /// Device was unlinked before.
    #[error("device revoked")]
    DeviceRevoked,
    /// Device already belongs to an account.
    #[error("device already linked")]
    DeviceTaken,
    /// Account creation not signed by the device itself.
    #[error("account creation must be self-signed")]
    NotSelfSigned,
    /// Signer is not a current device of the account.
    #[error("signer not linked to account")]
    SignerNotLinked,
    /// Unlink target is not a current device of the account.
    #[error("device not linked to account")]
    NotLinked,
}

/// Outcome of resolving a signer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Device currently acts for this account.
    Account(AccountId),
    /// Device never linked, or removed.
    Unresolved,
}

/// Device membership as of one causal point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceDirectory {
    devices: BTreeMap<DeviceId, AccountId>,
    accounts: BTreeMap<AccountId, BTreeSet<DeviceId>>,
    revoked: BTreeSet<DeviceId>,
}

impl DeviceDirectory {
    /// Account the device currently acts for.
    pub fn account_of(&self, device: &DeviceId) -> Option<&AccountId> {
        self.devices.get(device)
    }

    /// Current devices of an account.
    pub fn devices_of(&self, account: &AccountId) -> Option<&BTreeSet<DeviceId>> {
        self.accounts.get(account)
    }

    /// Every linked device with its account.
    pub fn linked(&self) -> impl Iterator<Item = (&DeviceId, &AccountId)> {
        self.devices.iter()
    }

    /// True if the device was unlinked at or before this point.
    pub fn is_revoked(&self, device: &DeviceId) -> bool {
        self.revoked.contains(device)
    }

    /// Apply one identity-log entry. Entries that are not valid link records, or break a
    /// rule, leave the directory unchanged.
    pub fn apply_entry(&mut self, entry: &LogEntry) {
        if entry.operation.as_str() != OP_DEVICE_LINK {
            return;
        }
        let (Some(signer), Ok(rec)) = (entry.identity, entry.decode_payload::<DeviceLinkRecord>())
        else {
            trace!(hash = %entry.hash, "ignoring undecodable link record");
            return;
        };
        if let Err(reason) = self.apply(&signer.device_id, &rec) {
            trace!(hash = %entry.hash, account = %rec.account, %reason, "link record has no effect");
        }
    }

    /// Apply one record signed by `signer`.
    pub fn apply(&mut self, signer: &DeviceId, rec: &DeviceLinkRecord) -> Result<(), LinkRejection> {
        match rec.action {
            LinkAction::Link => {
                if self.revoked.contains(&rec.device) {
                    return Err(LinkRejection::DeviceRevoked);
                }
                if self.devices.contains_key(&rec.device) {
                    return Err(LinkRejection::DeviceTaken);
                }
                match self.accounts.get(&rec.account) {
                    None if signer != &rec.device => return Err(LinkRejection::NotSelfSigned),
                    Some(members) if !members.contains(signer) => {
                        return Err(LinkRejection::SignerNotLinked)
                    }
                    _ => {}
                }
                self.accounts
                    .entry(rec.account.clone())
                    .or_default()
                    .insert(rec.device);
                self.devices.insert(rec.device, rec.account.clone());
            }
            LinkAction::Unlink => {
                let members = self
                    .accounts
                    .get_mut(&rec.account)
                    .ok_or(LinkRejection::SignerNotLinked)?;
                if !members.contains(signer) {
                    return Err(LinkRejection::SignerNotLinked);
                }
                if !members.remove(&rec.device) {
                    return Err(LinkRejection::NotLinked);
                }
                self.devices.remove(&rec.device);
                self.revoked.insert(rec.device);
            }
        }
        Ok(())
    }
}

/// Resolves signers to accounts from the identity log in a [`CausalStore`].
#[derive(Clone)]
pub struct IdentityResolver {
    log: LogAddress,
    store: Arc<CausalStore>,
}

impl IdentityResolver {
    /// Resolver over the identity log at `log`.
    pub fn new(log: LogAddress, store: Arc<CausalStore>) -> Self {
        Self { log, store }
    }

    /// Identity log address.
    pub fn log(&self) -> &LogAddress {
        &self.log
    }

    /// Device membership as of `point`.
    pub fn directory_at(&self, point: &CausalPoint) -> DeviceDirectory {
        let mut dir = DeviceDirectory::default();
        for entry in self.store.linearize_log(point, &self.log) {
            dir.apply_entry(&entry);
        }
        dir
    }

    /// Account `identity` acts for at `point`.
    pub fn resolve_account(&self, identity: &Identity, point: &CausalPoint) -> Resolution {
        match self.directory_at(point).account_of(&identity.device_id) {
            Some(account) => Resolution::Account(account.clone()),
            None => Resolution::Unresolved,
        }
    }

    /// Build a signed link/unlink entry for this identity log.
    pub fn link_entry<B: SignerBackend + ?Sized>(
        &self,
        signer: &B,
        record: &DeviceLinkRecord,
        parents: impl IntoIterator<Item = EntryHash>,
    ) -> Result<LogEntry, EntryError> {
        LogEntry::new_record(
            self.log.clone(),
            OperationKind::from(OP_DEVICE_LINK),
            record,
            parents,
            signer,
        )
    }
}
