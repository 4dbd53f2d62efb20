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

//! Role records and the materialized role state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::access::role_digest::{self, Hash32, RoleProof};
use crate::core::types::{AccountId, DeviceId, EntryHash, Role};

/// Operation kind of role-ledger entries.
pub const OP_ROLE: &str = "role";

/// Who a role record applies to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GrantTarget {
    /// Every device of an account.
    Account(AccountId),
    /// A single device.
    Device(DeviceId),
}

/// Grant or revoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleChange {
    /// Assign a role, replacing any previous one.
    Grant(Role),
    /// Remove the role.
    Revoke,
}

/// Payload of a role-ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    /// Subject.
    pub target: GrantTarget,
    /// Change.
    pub change: RoleChange,
}

impl RoleRecord {
    /// Grant `role` to an account.
    pub fn grant(account: impl Into<AccountId>, role: Role) -> Self {
        Self {
            target: GrantTarget::Account(account.into()),
            change: RoleChange::Grant(role),
        }
    }

    /// Revoke an account's role.
    pub fn revoke(account: impl Into<AccountId>) -> Self {
        Self {
            target: GrantTarget::Account(account.into()),
            change: RoleChange::Revoke,
        }
    }

    /// Grant `role` to one device.
    pub fn grant_device(device: DeviceId, role: Role) -> Self {
        Self {
            target: GrantTarget::Device(device),
            change: RoleChange::Grant(role),
        }
    }
}

/// What materialization did with one role-ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantOutcome {
    /// Bootstrap grant for the ledger creator.
    Genesis,
    /// Included.
    Applied,
    /// Issuer was not a moderator at that position.
    Unauthorized,
    /// Issuer's device is not on the ledger's allow-list.
    NotInAllowList,
    /// Issuer's device did not resolve to an account.
    UnresolvedIssuer,
    /// Would have left zero moderators.
    WouldOrphanModerators,
    /// Payload or operation kind not a role record.
    Malformed,
    /// Parentless entry other than the genesis grant.
    NotGenesis,
}

/// Materialized role assignments at one causal point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleState {
    accounts: BTreeMap<AccountId, Role>,
    devices: BTreeMap<DeviceId, Role>,
    outcomes: BTreeMap<EntryHash, GrantOutcome>,
}

impl RoleState {
    /// Account-scoped role.
    pub fn role_of(&self, account: &AccountId) -> Option<Role> {
        self.accounts.get(account).copied()
    }

    /// Device-scoped role.
    pub fn device_role(&self, device: &DeviceId) -> Option<Role> {
        self.devices.get(device).copied()
    }

    /// Higher of the account role and the device role.
    pub fn effective_role(&self, account: &AccountId, device: &DeviceId) -> Option<Role> {
        self.role_of(account).max(self.device_role(device))
    }

    /// Account-scoped assignments.
    pub fn accounts(&self) -> &BTreeMap<AccountId, Role> {
        &self.accounts
    }

    /// Device-scoped assignments.
    pub fn devices(&self) -> &BTreeMap<DeviceId, Role> {
        &self.devices
    }

    /// Accounts holding `moderator`.
    pub fn moderators(&self) -> impl Iterator<Item = &AccountId> {
        self.accounts
            .iter()
            .filter(|(_, r)| **r == Role::Moderator)
            .map(|(a, _)| a)
    }

    /// Number of account-scoped moderators.
    pub fn moderator_count(&self) -> usize {
        self.moderators().count()
    }

    /// What happened to a role-ledger entry at this point.
    pub fn outcome(&self, hash: &EntryHash) -> Option<GrantOutcome> {
        self.outcomes.get(hash).copied()
    }

    /// Every processed entry with its outcome.
    pub fn outcomes(&self) -> &BTreeMap<EntryHash, GrantOutcome> {
        &self.outcomes
    }

    pub(crate) fn record(&mut self, hash: EntryHash, outcome: GrantOutcome) {
        self.outcomes.insert(hash, outcome);
    }

    /// Apply a record and return the target's previous role.
    pub(crate) fn apply(&mut self, rec: &RoleRecord) -> Option<Role> {
        match (&rec.target, rec.change) {
            (GrantTarget::Account(a), RoleChange::Grant(r)) => self.accounts.insert(a.clone(), r),
            (GrantTarget::Account(a), RoleChange::Revoke) => self.accounts.remove(a),
            (GrantTarget::Device(d), RoleChange::Grant(r)) => self.devices.insert(*d, r),
            (GrantTarget::Device(d), RoleChange::Revoke) => self.devices.remove(d),
        }
    }

    /// Put back the role `apply` replaced.
    pub(crate) fn restore(&mut self, target: &GrantTarget, previous: Option<Role>) {
        match (target, previous) {
            (GrantTarget::Account(a), Some(r)) => {
                self.accounts.insert(a.clone(), r);
            }
            (GrantTarget::Account(a), None) => {
                self.accounts.remove(a);
            }
            (GrantTarget::Device(d), Some(r)) => {
                self.devices.insert(*d, r);
            }
            (GrantTarget::Device(d), None) => {
                self.devices.remove(d);
            }
        }
    }

    /// State holding exactly these assignments, with no outcomes.
    pub fn from_assignments(assignments: impl IntoIterator<Item = (GrantTarget, Role)>) -> Self {
        let mut state = Self::default();
        for (target, role) in assignments {
            state.apply(&RoleRecord {
                target,
                change: RoleChange::Grant(role),
            });
        }
        state
    }

    /// Every assignment, in target order (accounts before devices).
    pub fn assignments(&self) -> Vec<(GrantTarget, Role)> {
        let accounts = self
            .accounts
            .iter()
            .map(|(a, r)| (GrantTarget::Account(a.clone()), *r));
        let devices = self.devices.iter().map(|(d, r)| (GrantTarget::Device(*d), *r));
        accounts.chain(devices).collect()
    }

    /// Commitment to the role assignments (outcomes excluded).
    pub fn digest(&self) -> Hash32 {
        role_digest::root(&self.assignments())
    }

    /// Proof of `target`'s role against [`RoleState::digest`].
    pub fn prove(&self, target: &GrantTarget) -> Option<RoleProof> {
        let assignments = self.assignments();
        let idx = assignments.binary_search_by(|(t, _)| t.cmp(target)).ok()?;
        role_digest::prove(&assignments, idx)
    }

    /// Proof of an account's role against [`RoleState::digest`].
    pub fn prove_account(&self, account: &AccountId) -> Option<RoleProof> {
        self.prove(&GrantTarget::Account(account.clone()))
    }
}
