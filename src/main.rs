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

//! Rolegate node entrypoint (systemd-friendly).
//! Opens the causal store and role ledger, builds the configured controllers and serves metrics.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use rolegate::access::{
    controller::AccessController,
    identity::IdentityResolver,
    registry::{ControllerContext, ControllerRegistry},
    role_ledger::RoleLedger,
    writer_list::{load_and_verify_writer_list, WriterListPolicy},
};
use rolegate::core::{
    config::{NodeConfig, ENV_CONFIG},
    log::store::CausalStore,
};
use rolegate::monitoring::metrics::Metrics;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_tracing() {
    let json = matches!(env("ROLEGATE_LOG_JSON", "0").as_str(), "1" | "true");
    let builder = tracing_subscriber::fmt().with_target(false).with_level(true);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> (StatusCode, String) {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = env(ENV_CONFIG, "./rolegate.toml");
    let mut cfg = NodeConfig::load(&config_path).with_context(|| format!("loading {config_path}"))?;
    info!(
        config = %config_path,
        data_dir = %cfg.node.data_dir,
        git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        "rolegate node starting"
    );

    if let Some(list) = &cfg.writers {
        let mut policy = WriterListPolicy::default_with_now(0);
        policy.max_age_ms = list.max_age_ms;
        policy.grace_ms = list.grace_ms;
        policy.expected_log = Some(cfg.ledger.address.as_str());
        let verified = load_and_verify_writer_list(&list.path, &list.pubkey_hex, &policy)
            .with_context(|| format!("verifying writer list {}", list.path))?;
        info!(writers = verified.writers.len(), "signed writer list loaded");
        cfg.ledger.writers = verified.writers;
    }

    let metrics = Arc::new(Metrics::new().context("metrics init failed")?);
    let store = Arc::new(CausalStore::open(&cfg.node.data_dir).context("opening causal store")?);
    let identity = IdentityResolver::new(cfg.ledger.identity_log.clone(), store.clone());
    let ledger = Arc::new(
        RoleLedger::new(cfg.ledger_config()?, store.clone(), identity).with_metrics(metrics.clone()),
    );
    info!(
        ledger = %ledger.address(),
        moderators = ledger.current().moderator_count(),
        "role ledger ready"
    );

    let registry = ControllerRegistry::with_builtin();
    let ctx = ControllerContext::new(cfg.sync_timeout())
        .with_ledger(ledger.clone())
        .with_metrics(metrics.clone());
    let mut controllers: Vec<AccessController> = Vec::new();
    for governed in &cfg.governed {
        let controller = registry
            .construct(&governed.tag, &governed.controller, &ctx)
            .with_context(|| format!("opening governed log {}", governed.controller.address))?;
        info!(log = %controller.address(), kind = %controller.kind(), "governed log opened");
        controllers.push(controller);
    }

    let mut role_events = ledger.subscribe();
    let events_task = tokio::spawn(async move {
        loop {
            match role_events.recv().await {
                Ok(ev) => {
                    info!(subject = ?ev.subject, before = ?ev.before, after = ?ev.after, "role changed")
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "role event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(metrics);
    let listener = tokio::net::TcpListener::bind(&cfg.http.listen)
        .await
        .with_context(|| format!("binding {}", cfg.http.listen))?;
    info!(listen = %cfg.http.listen, "metrics endpoint up");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(?e, "signal handler failed");
            }
        })
        .await
        .context("http server failed")?;

    for controller in &controllers {
        if let AccessController::RoleAware(c) = controller {
            c.close();
        }
    }
    events_task.abort();
    store.flush().context("flushing store")?;
    info!("rolegate node stopped");
    Ok(())
}
