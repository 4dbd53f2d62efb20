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

//! Allow-list controller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::access::controller::{Denial, Verdict};
use crate::core::{
    log::entry::LogEntry,
    types::{DeviceId, HexError, LogAddress},
};

/// Allow-list wildcard.
pub const WILDCARD: &str = "*";

/// One allow-list item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Writer {
    /// Any well-formed signer.
    Any,
    /// One device.
    Device(DeviceId),
}

impl FromStr for Writer {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            WILDCARD => Ok(Writer::Any),
            hex => DeviceId::from_hex(hex).map(Writer::Device),
        }
    }
}

impl TryFrom<String> for Writer {
    type Error = HexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Writer> for String {
    fn from(w: Writer) -> Self {
        w.to_string()
    }
}

impl fmt::Display for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Writer::Any => f.write_str(WILDCARD),
            Writer::Device(d) => f.write_str(&d.to_hex()),
        }
    }
}

/// Accepts an entry iff its signer is on the list, or the list holds the wildcard.
#[derive(Clone, Debug)]
pub struct BaseListController {
    address: LogAddress,
    writers: BTreeSet<Writer>,
}

impl BaseListController {
    /// Controller for `address` with the given writers.
    pub fn new(address: LogAddress, writers: impl IntoIterator<Item = Writer>) -> Self {
        Self {
            address,
            writers: writers.into_iter().collect(),
        }
    }

    /// Governed log.
    pub fn address(&self) -> &LogAddress {
        &self.address
    }

    /// Configured writers.
    pub fn allowed_writers(&self) -> &BTreeSet<Writer> {
        &self.writers
    }

    /// True if the list contains the wildcard.
    pub fn is_open(&self) -> bool {
        self.writers.contains(&Writer::Any)
    }

    /// Membership test for one device.
    pub fn permits(&self, device: &DeviceId) -> bool {
        self.is_open() || self.writers.contains(&Writer::Device(*device))
    }

    /// Decide an append.
    pub fn can_append(&self, entry: &LogEntry) -> Verdict {
        let identity = match entry.verify() {
            Ok(identity) => identity,
            Err(e) => return Verdict::Reject(e.into()),
        };
        if entry.log != self.address {
            return Verdict::deny(Denial::ForeignLog(entry.log.clone()));
        }
        if self.permits(&identity.device_id) {
            Verdict::Accept
        } else {
            Verdict::deny(Denial::NotInAllowList)
        }
    }
}
