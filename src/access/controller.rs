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

//! Controller capability surface: the closed set of controller kinds and append verdicts.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::access::base_list::{BaseListController, Writer};
use crate::access::role_aware::RoleAwareController;
use crate::core::{
    log::entry::{LogEntry, MalformedEntry},
    types::{LogAddress, OperationKind, Role},
};

/// Registry tag of [`BaseListController`].
pub const TAG_BASE_LIST: &str = "base-list";
/// Registry tag of [`RoleAwareController`].
pub const TAG_ROLE_AWARE: &str = "role-aware";

/// Kinds of access controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ControllerKind {
    /// Explicit allow-list.
    BaseList,
    /// Role ledger + identity + policy.
    RoleAware,
}

impl ControllerKind {
    /// Default registry tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::BaseList => TAG_BASE_LIST,
            ControllerKind::RoleAware => TAG_ROLE_AWARE,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown controller kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown controller kind {0:?}")]
pub struct UnknownKind(pub String);

impl FromStr for ControllerKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            TAG_BASE_LIST => Ok(ControllerKind::BaseList),
            TAG_ROLE_AWARE => Ok(ControllerKind::RoleAware),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Why a well-formed entry was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Signer is not on the allow-list.
    #[error("signer not in allow-list")]
    NotInAllowList,
    /// Entry targets a log this controller does not govern.
    #[error("entry belongs to log {0}")]
    ForeignLog(LogAddress),
    /// Signer resolves to no account and no default role applies.
    #[error("unresolved identity")]
    UnresolvedIdentity,
    /// Account holds no role and no default role applies.
    #[error("no role")]
    NoRole,
    /// Operation is not in the policy.
    #[error("operation {0} not permitted by policy")]
    UnknownOperation(OperationKind),
    /// Role is not allowed to perform the operation.
    #[error("role {role} may not {operation}")]
    RoleNotAllowed {
        /// Resolved role.
        role: Role,
        /// Requested operation.
        operation: OperationKind,
    },
}

/// Rejected append.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Structural defect; treat as corruption, not policy.
    #[error("malformed entry: {0}")]
    Malformed(#[from] MalformedEntry),
    /// Policy refusal.
    #[error("permission denied: {0}")]
    PermissionDenied(#[from] Denial),
    /// Local replica has not observed the entry's causal point in time.
    #[error("causal point not synced ({missing} missing)")]
    SyncTimeout {
        /// Frontier hashes missing at expiry.
        missing: usize,
    },
    /// Controller was closed while the decision was pending.
    #[error("controller closed")]
    Cancelled,
}

/// Outcome of `can_append`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Entry may be appended.
    Accept,
    /// Entry must not be appended.
    Reject(Rejection),
}

impl Verdict {
    /// Shorthand for a policy refusal.
    pub fn deny(denial: Denial) -> Self {
        Verdict::Reject(Rejection::PermissionDenied(denial))
    }

    /// True only for [`Verdict::Accept`].
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    /// True if the same entry may be accepted once the replica catches up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Verdict::Reject(Rejection::SyncTimeout { .. }))
    }

    /// True for structural rejections.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Verdict::Reject(Rejection::Malformed(_)))
    }
}

/// An access controller instance.
#[derive(Debug)]
pub enum AccessController {
    /// Allow-list controller.
    BaseList(BaseListController),
    /// Role-aware controller.
    RoleAware(RoleAwareController),
}

impl AccessController {
    /// Controller kind.
    pub fn kind(&self) -> ControllerKind {
        match self {
            AccessController::BaseList(_) => ControllerKind::BaseList,
            AccessController::RoleAware(_) => ControllerKind::RoleAware,
        }
    }

    /// Address of the governed log.
    pub fn address(&self) -> &LogAddress {
        match self {
            AccessController::BaseList(c) => c.address(),
            AccessController::RoleAware(c) => c.address(),
        }
    }

    /// Decide whether `entry` may be appended.
    pub async fn can_append(&self, entry: &LogEntry) -> Verdict {
        match self {
            AccessController::BaseList(c) => c.can_append(entry),
            AccessController::RoleAware(c) => c.can_append(entry).await,
        }
    }

    /// Writers that could currently append at least one operation.
    pub fn allowed_writers(&self) -> BTreeSet<Writer> {
        match self {
            AccessController::BaseList(c) => c.allowed_writers().clone(),
            AccessController::RoleAware(c) => c.allowed_writers(),
        }
    }
}
