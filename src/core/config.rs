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

//! Node configuration (TOML).
//!
//! ```text
//! [node]
//! data_dir = "./data"
//!
//! [http]
//! listen = "127.0.0.1:9100"
//!
//! [ledger]
//! address = "rolegate/role-ledger"
//! identity_log = "rolegate/identity"
//! creator = "<device id hex>"
//! writers = ["*"]
//! sync_timeout_ms = 10000
//!
//! [writers]                      # optional signed list replacing `ledger.writers`
//! path = "./writers.toml"
//! pubkey_hex = "<ed25519 key hex>"
//!
//! [[governed]]
//! tag = "role-aware"
//! [governed.controller]
//! address = "chat/general"
//! role_ledger_address = "rolegate/role-ledger"
//! allowed_roles_by_operation = { post = ["member", "moderator"] }
//! ```
//!
//! `ROLEGATE_DATA_DIR` overrides `node.data_dir`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use crate::access::base_list::Writer;
use crate::access::registry::ControllerConfig;
use crate::access::role_ledger::{RoleLedgerConfig, DEFAULT_CACHE_CAPACITY};
use crate::core::types::{DeviceId, LogAddress};

/// Environment variable naming the config file.
pub const ENV_CONFIG: &str = "ROLEGATE_CONFIG";
/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "ROLEGATE_DATA_DIR";

/// Config errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("read {path}: {source}")]
    Read {
        /// Path.
        path: String,
        /// Cause.
        source: std::io::Error,
    },
    /// TOML did not match the schema.
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// `ledger.creator` is not a device id.
    #[error("ledger.creator is not a 32-byte hex device id")]
    BadCreator,
}

/// `[node]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSection {
    /// Sled directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// `[http]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSection {
    /// Metrics listen address.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// `[ledger]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Role ledger log.
    pub address: LogAddress,
    /// Identity log.
    pub identity_log: LogAddress,
    /// Genesis device (hex).
    pub creator: String,
    /// Ledger allow-list.
    #[serde(default = "default_writers")]
    pub writers: BTreeSet<Writer>,
    /// Bound on sync waits, in ms.
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
    /// Cached materializations.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// `[writers]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterListSection {
    /// Signed list path.
    pub path: String,
    /// Pinned signer key (hex).
    pub pubkey_hex: String,
    /// Max list age in ms (0 = unlimited).
    #[serde(default)]
    pub max_age_ms: u64,
    /// Grace after expiry in ms.
    #[serde(default)]
    pub grace_ms: u64,
}

/// One `[[governed]]` log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernedLog {
    /// Registry tag.
    pub tag: String,
    /// Controller parameters.
    pub controller: ControllerConfig,
}

/// Whole node configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// `[node]`.
    #[serde(default)]
    pub node: NodeSection,
    /// `[http]`.
    #[serde(default)]
    pub http: HttpSection,
    /// `[ledger]`.
    pub ledger: LedgerSection,
    /// `[writers]`.
    #[serde(default)]
    pub writers: Option<WriterListSection>,
    /// `[[governed]]`.
    #[serde(default)]
    pub governed: Vec<GovernedLog>,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:9100".to_string()
}

fn default_writers() -> BTreeSet<Writer> {
    BTreeSet::from([Writer::Any])
}

fn default_sync_timeout_ms() -> u64 {
    10_000
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl NodeConfig {
    /// Parse a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse a file, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let mut cfg = Self::from_toml(&raw)?;
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            cfg.node.data_dir = dir;
        }
        Ok(cfg)
    }

    /// Genesis device.
    pub fn creator(&self) -> Result<DeviceId, ConfigError> {
        DeviceId::from_hex(&self.ledger.creator).map_err(|_| ConfigError::BadCreator)
    }

    /// Role ledger parameters.
    pub fn ledger_config(&self) -> Result<RoleLedgerConfig, ConfigError> {
        Ok(RoleLedgerConfig {
            address: self.ledger.address.clone(),
            creator: self.creator()?,
            writers: self.ledger.writers.clone(),
            cache_capacity: self.ledger.cache_capacity,
        })
    }

    /// Bound on sync waits.
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger.sync_timeout_ms)
    }
}
