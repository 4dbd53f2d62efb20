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

//! Controller registry: type tag → factory.
//!
//! The registry is an explicit value built once at startup and handed to whatever opens governed
//! logs. Registering the same factory twice under a tag is a no-op; a different factory under a
//! taken tag is an error.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::access::address::ControllerManifest;
use crate::access::base_list::{BaseListController, Writer};
use crate::access::controller::{AccessController, ControllerKind, TAG_BASE_LIST, TAG_ROLE_AWARE};
use crate::access::role_aware::{AccessControllerConfig, RoleAwareController};
use crate::access::role_ledger::RoleLedger;
use crate::core::types::{LogAddress, OperationKind, Role};
use crate::monitoring::metrics::Metrics;

/// Default bound on waiting for a causal point.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Controller construction errors. Fatal for the log being opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Role-aware controller configured without a role ledger.
    #[error("missing role ledger address")]
    MissingRoleLedger,
    /// The named role ledger has not been opened.
    #[error("role ledger {0} not available")]
    RoleLedgerUnavailable(LogAddress),
    /// Policy names a different ledger than the one supplied.
    #[error("role ledger mismatch: configured {expected}, got {found}")]
    LedgerMismatch {
        /// Configured ledger.
        expected: LogAddress,
        /// Supplied ledger.
        found: LogAddress,
    },
    /// A role-aware controller cannot govern the role ledger or identity log it reads.
    #[error("log {0} cannot govern itself")]
    SelfGoverned(LogAddress),
    /// Allow-list controller without writers.
    #[error("empty allow-list")]
    EmptyAllowList,
    /// Role-aware controller without any operation.
    #[error("empty role policy")]
    EmptyPolicy,
    /// Log address empty or not normalized.
    #[error("invalid log address {0:?}")]
    InvalidAddress(String),
}

/// Serialized controller configuration, as found in node config files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Governed log.
    pub address: LogAddress,
    /// Allow-list (`base-list`).
    #[serde(default)]
    pub writers: BTreeSet<Writer>,
    /// Role ledger (`role-aware`).
    #[serde(default)]
    pub role_ledger_address: Option<LogAddress>,
    /// Default role (`role-aware`).
    #[serde(default)]
    pub default_role: Option<Role>,
    /// Policy (`role-aware`).
    #[serde(default)]
    pub allowed_roles_by_operation: BTreeMap<OperationKind, BTreeSet<Role>>,
}

impl ControllerConfig {
    /// Allow-list configuration.
    pub fn base_list(address: LogAddress, writers: impl IntoIterator<Item = Writer>) -> Self {
        Self {
            address,
            writers: writers.into_iter().collect(),
            role_ledger_address: None,
            default_role: None,
            allowed_roles_by_operation: BTreeMap::new(),
        }
    }

    /// Role-aware configuration.
    pub fn role_aware(address: LogAddress, policy: AccessControllerConfig) -> Self {
        Self {
            address,
            writers: BTreeSet::new(),
            role_ledger_address: Some(policy.role_ledger_address),
            default_role: policy.default_role,
            allowed_roles_by_operation: policy.allowed_roles_by_operation,
        }
    }

    fn checked_address(&self) -> Result<LogAddress, ControllerError> {
        let raw = self.address.as_str();
        if raw.is_empty() || crate::access::address::path_join([raw]) != raw {
            return Err(ControllerError::InvalidAddress(raw.to_string()));
        }
        Ok(self.address.clone())
    }
}

/// Dependencies available to factories.
#[derive(Clone)]
pub struct ControllerContext {
    ledgers: BTreeMap<LogAddress, Arc<RoleLedger>>,
    sync_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl Default for ControllerContext {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_TIMEOUT)
    }
}

impl ControllerContext {
    /// Context without ledgers.
    pub fn new(sync_timeout: Duration) -> Self {
        Self {
            ledgers: BTreeMap::new(),
            sync_timeout,
            metrics: None,
        }
    }

    /// Make an opened role ledger available.
    pub fn with_ledger(mut self, ledger: Arc<RoleLedger>) -> Self {
        self.ledgers.insert(ledger.address().clone(), ledger);
        self
    }

    /// Attach metrics to constructed controllers.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Opened ledger at `address`.
    pub fn ledger(&self, address: &LogAddress) -> Option<Arc<RoleLedger>> {
        self.ledgers.get(address).cloned()
    }

    /// Bound on sync waits.
    pub fn sync_timeout(&self) -> Duration {
        self.sync_timeout
    }
}

/// Factory signature.
pub type BuildFn = fn(&ControllerConfig, &ControllerContext) -> Result<AccessController, ControllerError>;

/// A controller factory: the kind it builds, a name and its constructor.
///
/// Two factories are the same when kind and name match; the constructor is not compared.
#[derive(Clone, Copy, Debug)]
pub struct ControllerFactory {
    /// Kind of controller produced.
    pub kind: ControllerKind,
    /// Stable name of the constructor, unique per kind.
    pub name: &'static str,
    /// Constructor.
    pub build: BuildFn,
}

impl PartialEq for ControllerFactory {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

impl Eq for ControllerFactory {}

impl ControllerFactory {
    /// Built-in allow-list factory.
    pub const BASE_LIST: Self = Self {
        kind: ControllerKind::BaseList,
        name: "rolegate.base-list",
        build: build_base_list,
    };

    /// Built-in role-aware factory.
    pub const ROLE_AWARE: Self = Self {
        kind: ControllerKind::RoleAware,
        name: "rolegate.role-aware",
        build: build_role_aware,
    };

    /// Built-in factory for `kind`.
    pub fn builtin(kind: ControllerKind) -> Self {
        match kind {
            ControllerKind::BaseList => Self::BASE_LIST,
            ControllerKind::RoleAware => Self::ROLE_AWARE,
        }
    }
}

fn build_base_list(cfg: &ControllerConfig, _ctx: &ControllerContext) -> Result<AccessController, ControllerError> {
    let address = cfg.checked_address()?;
    if cfg.writers.is_empty() {
        return Err(ControllerError::EmptyAllowList);
    }
    Ok(AccessController::BaseList(BaseListController::new(
        address,
        cfg.writers.iter().copied(),
    )))
}

fn build_role_aware(cfg: &ControllerConfig, ctx: &ControllerContext) -> Result<AccessController, ControllerError> {
    let address = cfg.checked_address()?;
    let ledger_address = cfg
        .role_ledger_address
        .clone()
        .ok_or(ControllerError::MissingRoleLedger)?;
    let ledger = ctx
        .ledger(&ledger_address)
        .ok_or_else(|| ControllerError::RoleLedgerUnavailable(ledger_address.clone()))?;
    let policy = AccessControllerConfig {
        role_ledger_address: ledger_address,
        default_role: cfg.default_role,
        allowed_roles_by_operation: cfg.allowed_roles_by_operation.clone(),
    };
    let mut controller = RoleAwareController::new(address, policy, ledger, ctx.sync_timeout())?;
    if let Some(m) = &ctx.metrics {
        controller = controller.with_metrics(m.clone());
    }
    Ok(AccessController::RoleAware(controller))
}

/// Registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A different factory already owns the tag.
    #[error("controller tag {tag:?} already registered with a different factory")]
    Conflict {
        /// Contested tag.
        tag: String,
    },
    /// No factory for the tag.
    #[error("unknown controller type {0:?}")]
    UnknownType(String),
    /// Tag is empty or contains `/`.
    #[error("invalid controller tag {0:?}")]
    InvalidTag(String),
    /// Factory rejected the configuration.
    #[error("constructing {tag:?}: {source}")]
    Construct {
        /// Tag used.
        tag: String,
        /// Cause.
        source: ControllerError,
    },
}

/// Tag → factory table.
#[derive(Clone, Debug, Default)]
pub struct ControllerRegistry {
    factories: BTreeMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `base-list` and `role-aware`.
    pub fn with_builtin() -> Self {
        let mut r = Self::new();
        r.factories
            .insert(TAG_BASE_LIST.to_string(), ControllerFactory::BASE_LIST);
        r.factories
            .insert(TAG_ROLE_AWARE.to_string(), ControllerFactory::ROLE_AWARE);
        r
    }

    /// Register `factory` under `tag`.
    pub fn register(&mut self, tag: &str, factory: ControllerFactory) -> Result<(), RegistryError> {
        if tag.trim().is_empty() || tag.contains('/') || tag.trim() != tag {
            return Err(RegistryError::InvalidTag(tag.to_string()));
        }
        match self.factories.get(tag) {
            Some(existing) if *existing == factory => {
                debug!(tag, "controller factory already registered");
                Ok(())
            }
            Some(_) => Err(RegistryError::Conflict {
                tag: tag.to_string(),
            }),
            None => {
                info!(tag, kind = %factory.kind, "controller factory registered");
                self.factories.insert(tag.to_string(), factory);
                Ok(())
            }
        }
    }

    /// Factory registered under `tag`.
    pub fn get(&self, tag: &str) -> Option<&ControllerFactory> {
        self.factories.get(tag)
    }

    /// Registered tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a controller.
    pub fn construct(
        &self,
        tag: &str,
        config: &ControllerConfig,
        ctx: &ControllerContext,
    ) -> Result<AccessController, RegistryError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| RegistryError::UnknownType(tag.to_string()))?;
        (factory.build)(config, ctx).map_err(|source| RegistryError::Construct {
            tag: tag.to_string(),
            source,
        })
    }

    /// Rebuild the controller a manifest describes, with `config` supplying its parameters.
    pub fn open(
        &self,
        manifest: &ControllerManifest,
        config: &ControllerConfig,
        ctx: &ControllerContext,
    ) -> Result<AccessController, RegistryError> {
        if config.address != manifest.log {
            return Err(RegistryError::Construct {
                tag: manifest.tag.clone(),
                source: ControllerError::InvalidAddress(config.address.to_string()),
            });
        }
        self.construct(&manifest.tag, config, ctx)
    }
}
