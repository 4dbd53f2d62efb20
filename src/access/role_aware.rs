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

//! Role-aware controller for governed logs.
//!
//! An append is accepted iff the signer's role at the entry's causal point is allowed for the
//! entry's operation. Deciding may wait (bounded) for the local store to reach that point; expiry
//! and [`RoleAwareController::close`] both fail closed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::access::base_list::Writer;
use crate::access::controller::{ControllerKind, Denial, Rejection, Verdict};
use crate::access::registry::ControllerError;
use crate::access::role_ledger::{RoleEvent, RoleLedger};
use crate::core::{
    log::entry::LogEntry,
    log::store::SyncError,
    types::{CausalPoint, Identity, LogAddress, OperationKind, Role},
};
use crate::monitoring::metrics::Metrics;

/// Policy of a role-aware controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControllerConfig {
    /// Role ledger consulted for roles.
    pub role_ledger_address: LogAddress,
    /// Role assumed for signers without one. `None` denies them.
    #[serde(default)]
    pub default_role: Option<Role>,
    /// Roles allowed per operation kind. Operations not listed are denied.
    pub allowed_roles_by_operation: BTreeMap<OperationKind, BTreeSet<Role>>,
}

impl AccessControllerConfig {
    /// Empty policy bound to a role ledger.
    pub fn new(role_ledger_address: LogAddress) -> Self {
        Self {
            role_ledger_address,
            default_role: None,
            allowed_roles_by_operation: BTreeMap::new(),
        }
    }

    /// Allow `roles` to perform `operation`.
    pub fn allow(mut self, operation: impl Into<OperationKind>, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles_by_operation
            .entry(operation.into())
            .or_default()
            .extend(roles);
        self
    }

    /// Set the default role.
    pub fn with_default_role(mut self, role: Option<Role>) -> Self {
        self.default_role = role;
        self
    }

    /// True if `role` may perform `operation`.
    pub fn allows(&self, role: Role, operation: &OperationKind) -> bool {
        self.allowed_roles_by_operation
            .get(operation)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    fn allows_anything(&self, role: Role) -> bool {
        self.allowed_roles_by_operation
            .values()
            .any(|roles| roles.contains(&role))
    }
}

/// Controller deciding appends from the role ledger, identity log and a static policy.
pub struct RoleAwareController {
    address: LogAddress,
    config: AccessControllerConfig,
    ledger: Arc<RoleLedger>,
    sync_timeout: Duration,
    shutdown: watch::Sender<bool>,
    metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for RoleAwareController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleAwareController")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RoleAwareController {
    /// Controller for the governed log at `address`.
    pub fn new(
        address: LogAddress,
        config: AccessControllerConfig,
        ledger: Arc<RoleLedger>,
        sync_timeout: Duration,
    ) -> Result<Self, ControllerError> {
        if &config.role_ledger_address != ledger.address() {
            return Err(ControllerError::LedgerMismatch {
                expected: config.role_ledger_address,
                found: ledger.address().clone(),
            });
        }
        if &address == ledger.address() || &address == ledger.identity().log() {
            return Err(ControllerError::SelfGoverned(address));
        }
        if config.allowed_roles_by_operation.is_empty() {
            return Err(ControllerError::EmptyPolicy);
        }
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            address,
            config,
            ledger,
            sync_timeout,
            shutdown,
            metrics: None,
        })
    }

    /// Attach metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Always [`ControllerKind::RoleAware`].
    pub fn kind(&self) -> ControllerKind {
        ControllerKind::RoleAware
    }

    /// Governed log.
    pub fn address(&self) -> &LogAddress {
        &self.address
    }

    /// Policy.
    pub fn config(&self) -> &AccessControllerConfig {
        &self.config
    }

    /// Role ledger.
    pub fn ledger(&self) -> &Arc<RoleLedger> {
        &self.ledger
    }

    /// Role-change notifications of the underlying ledger.
    pub fn subscribe(&self) -> broadcast::Receiver<RoleEvent> {
        self.ledger.subscribe()
    }

    /// Abandon pending and future decisions; they resolve to [`Rejection::Cancelled`].
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            debug!(log = %self.address, "role-aware controller closed");
        }
    }

    /// True after [`RoleAwareController::close`].
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Decide `entry` at the causal point it was authored at.
    pub async fn can_append(&self, entry: &LogEntry) -> Verdict {
        self.can_append_at(entry, &entry.point()).await
    }

    /// Decide `entry` at an explicit causal point.
    pub async fn can_append_at(&self, entry: &LogEntry, point: &CausalPoint) -> Verdict {
        let verdict = self.decide(entry, point).await;
        if let Some(m) = &self.metrics {
            m.record(&verdict);
        }
        debug!(log = %self.address, hash = %entry.hash, op = %entry.operation, ?verdict, "append decision");
        verdict
    }

    /// Decide several entries concurrently, each at its own causal point.
    pub async fn can_append_batch(&self, entries: &[LogEntry]) -> Vec<Verdict> {
        join_all(entries.iter().map(|e| self.can_append(e))).await
    }

    async fn decide(&self, entry: &LogEntry, point: &CausalPoint) -> Verdict {
        let identity = match entry.verify() {
            Ok(identity) => *identity,
            Err(e) => return Verdict::Reject(e.into()),
        };
        if entry.log != self.address {
            return Verdict::deny(Denial::ForeignLog(entry.log.clone()));
        }
        if self.is_closed() {
            return Verdict::Reject(Rejection::Cancelled);
        }

        let synced = tokio::select! {
            r = self.ledger.store().wait_for(point, self.sync_timeout) => r,
            _ = closed(self.shutdown.subscribe()) => return Verdict::Reject(Rejection::Cancelled),
        };
        if let Err(SyncError::Timeout { missing }) = synced {
            warn!(log = %self.address, hash = %entry.hash, missing, "causal point not synced; failing closed");
            return Verdict::Reject(Rejection::SyncTimeout { missing });
        }

        match self.resolved_role(&identity, point) {
            Ok(role) if self.config.allows(role, &entry.operation) => Verdict::Accept,
            Ok(role) => {
                if self.config.allowed_roles_by_operation.contains_key(&entry.operation) {
                    Verdict::deny(Denial::RoleNotAllowed {
                        role,
                        operation: entry.operation.clone(),
                    })
                } else {
                    Verdict::deny(Denial::UnknownOperation(entry.operation.clone()))
                }
            }
            Err(denial) => Verdict::deny(denial),
        }
    }

    /// Role of `identity` at `point`: its effective role, else the default role.
    ///
    /// Devices that do not resolve to an account only ever get the default role.
    pub fn resolved_role(&self, identity: &Identity, point: &CausalPoint) -> Result<Role, Denial> {
        let view = self.ledger.view_at(point);
        match view.directory.account_of(&identity.device_id) {
            Some(account) => view
                .roles
                .effective_role(account, &identity.device_id)
                .or(self.config.default_role)
                .ok_or(Denial::NoRole),
            None => self.config.default_role.ok_or(Denial::UnresolvedIdentity),
        }
    }

    /// Devices that could append at least one operation at the current heads.
    pub fn allowed_writers(&self) -> BTreeSet<Writer> {
        if let Some(role) = self.config.default_role {
            if self.config.allows_anything(role) {
                return BTreeSet::from([Writer::Any]);
            }
        }
        let view = self.ledger.view_at(&self.ledger.store().heads());
        let writers = view
            .directory
            .linked()
            .filter(|(device, account)| {
                view.roles
                    .effective_role(account, device)
                    .map(|role| self.config.allows_anything(role))
                    .unwrap_or(false)
            })
            .map(|(device, _)| Writer::Device(*device))
            .collect();
        writers
    }
}

async fn closed(mut rx: watch::Receiver<bool>) {
    // A dropped sender means the controller is gone.
    let _ = rx.wait_for(|closed| *closed).await;
}
