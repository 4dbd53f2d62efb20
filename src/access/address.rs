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

//! Address helpers: segment joining and controller manifests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::LogAddress;

/// Root segment of manifest addresses.
pub const MANIFEST_ROOT: &str = "/rolegate";

/// Join address segments with `/` and normalize the result.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment, a leading `/` on the
/// first non-empty segment is kept. Joining nothing yields `"."`.
pub fn path_join<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut absolute = None;
    let mut parts: Vec<String> = Vec::new();
    for seg in segments {
        let seg = seg.as_ref();
        if seg.is_empty() {
            continue;
        }
        absolute.get_or_insert(seg.starts_with('/'));
        for part in seg.split('/') {
            match part {
                "" | "." => {}
                ".." => match parts.last().map(String::as_str) {
                    Some(last) if last != ".." => {
                        parts.pop();
                    }
                    // Cannot climb above the root.
                    _ if absolute == Some(true) => {}
                    _ => parts.push("..".to_string()),
                },
                p => parts.push(p.to_string()),
            }
        }
    }

    let joined = parts.join("/");
    match (absolute == Some(true), joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Manifest errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// Address is not under [`MANIFEST_ROOT`].
    #[error("address not under /rolegate")]
    NotAManifest,
    /// Tag segment missing.
    #[error("missing controller tag")]
    MissingTag,
    /// Log segment missing.
    #[error("missing log address")]
    MissingLog,
}

/// Controller type tag plus governed log, embedded in an address so any peer can rebuild an
/// equivalent controller through the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerManifest {
    /// Registry tag.
    pub tag: String,
    /// Governed log.
    pub log: LogAddress,
}

impl ControllerManifest {
    /// New manifest.
    pub fn new(tag: impl Into<String>, log: LogAddress) -> Self {
        Self {
            tag: tag.into(),
            log,
        }
    }

    /// `/rolegate/<tag>/<log>`, normalized.
    pub fn address(&self) -> String {
        path_join([MANIFEST_ROOT, self.tag.as_str(), self.log.as_str()])
    }

    /// Parse an address produced by [`ControllerManifest::address`].
    pub fn parse(address: &str) -> Result<Self, ManifestError> {
        let normalized = path_join([address]);
        let rest = normalized
            .strip_prefix(MANIFEST_ROOT)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or(ManifestError::NotAManifest)?;
        let (tag, log) = rest.split_once('/').ok_or(ManifestError::MissingLog)?;
        if tag.is_empty() {
            return Err(ManifestError::MissingTag);
        }
        if log.is_empty() {
            return Err(ManifestError::MissingLog);
        }
        Ok(Self::new(tag, LogAddress::new(log)))
    }
}
