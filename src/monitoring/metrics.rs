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

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

use crate::access::controller::{Rejection, Verdict};

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric creation, registration or encoding failed.
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Accepted appends.
    pub appends_accepted_total: IntCounter,
    /// Policy refusals.
    pub appends_denied_total: IntCounter,
    /// Structurally invalid entries.
    pub appends_malformed_total: IntCounter,
    /// Decisions that timed out waiting for sync.
    pub sync_timeouts_total: IntCounter,
    /// Decisions abandoned on close.
    pub decisions_cancelled_total: IntCounter,

    /// Entries on the role ledger.
    pub role_ledger_entries: IntGauge,
    /// Account-scoped moderators at the ledger head.
    pub moderators: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let c = IntCounter::new(name, help).map_err(|_| MetricsError::Prom)?;
    registry
        .register(Box::new(c.clone()))
        .map_err(|_| MetricsError::Prom)?;
    Ok(c)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, MetricsError> {
    let g = IntGauge::new(name, help).map_err(|_| MetricsError::Prom)?;
    registry
        .register(Box::new(g.clone()))
        .map_err(|_| MetricsError::Prom)?;
    Ok(g)
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let appends_accepted_total =
            counter(&registry, "rolegate_appends_accepted_total", "Accepted appends")?;
        let appends_denied_total =
            counter(&registry, "rolegate_appends_denied_total", "Appends denied by policy")?;
        let appends_malformed_total = counter(
            &registry,
            "rolegate_appends_malformed_total",
            "Malformed entries rejected",
        )?;
        let sync_timeouts_total = counter(
            &registry,
            "rolegate_sync_timeouts_total",
            "Decisions failed closed on sync timeout",
        )?;
        let decisions_cancelled_total = counter(
            &registry,
            "rolegate_decisions_cancelled_total",
            "Decisions abandoned by controller close",
        )?;

        let role_ledger_entries =
            gauge(&registry, "rolegate_role_ledger_entries", "Role ledger entries")?;
        let moderators = gauge(&registry, "rolegate_moderators", "Moderators at ledger head")?;

        Ok(Self {
            registry,
            appends_accepted_total,
            appends_denied_total,
            appends_malformed_total,
            sync_timeouts_total,
            decisions_cancelled_total,
            role_ledger_entries,
            moderators,
        })
    }

    /// Count one decision.
    pub fn record(&self, verdict: &Verdict) {
        match verdict {
            Verdict::Accept => self.appends_accepted_total.inc(),
            Verdict::Reject(Rejection::PermissionDenied(_)) => self.appends_denied_total.inc(),
            Verdict::Reject(Rejection::Malformed(_)) => self.appends_malformed_total.inc(),
            Verdict::Reject(Rejection::SyncTimeout { .. }) => self.sync_timeouts_total.inc(),
            Verdict::Reject(Rejection::Cancelled) => self.decisions_cancelled_total.inc(),
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|_| MetricsError::Prom)?;
        String::from_utf8(buf).map_err(|_| MetricsError::Prom)
    }
}
