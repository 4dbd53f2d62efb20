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

mod common;

use std::sync::Arc;

use common::*;
use rolegate::access::role_state::RoleRecord;
use rolegate::core::{
    log::store::CausalStore,
    types::{LogAddress, Role},
};
use rolegate::monitoring::metrics::Metrics;

#[test]
fn reopened_store_materializes_the_same_roles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().to_str().expect("utf8 path").to_string();
    let (a, b, c) = (key(1), key(2), key(3));

    let (digest, outcomes, heads) = {
        let store = Arc::new(CausalStore::open(&path).expect("open"));
        let ledger = ledger_on(store.clone(), &a);
        populate(&ledger, &a, &b, &c);
        grant(&ledger, &c, RoleRecord::revoke("A"));
        store.flush().expect("flush");

        assert_eq!(store.persisted_len_of(&LogAddress::from(LEDGER)), 4);
        assert_eq!(store.persisted_len_of(&LogAddress::from(IDENTITY)), 3);
        let state = ledger.current();
        (state.digest(), state.outcomes().clone(), store.heads())
    };

    let store = Arc::new(CausalStore::open(&path).expect("reopen"));
    assert_eq!(store.len(), 7);
    assert_eq!(store.heads(), heads);

    let ledger = ledger_on(store, &a);
    let state = ledger.current();
    assert_eq!(state.digest(), digest);
    assert_eq!(state.outcomes(), &outcomes);
    assert_eq!(state.role_of(&"A".into()), None);
    assert_eq!(state.role_of(&"C".into()), Some(Role::Moderator));
}

#[test]
fn in_memory_store_persists_nothing() {
    let w = world();
    assert_eq!(w.ledger.store().persisted_len_of(&LogAddress::from(LEDGER)), 0);
    assert_eq!(w.ledger.store().len_of(&LogAddress::from(LEDGER)), 3);
    w.ledger.store().flush().expect("flush is a no-op");
}

#[test]
fn metrics_follow_decisions_and_ledger_head() {
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let a = key(1);
    let store = Arc::new(CausalStore::new());
    let identity = rolegate::access::identity::IdentityResolver::new(LogAddress::from(IDENTITY), store.clone());
    let cfg = rolegate::access::role_ledger::RoleLedgerConfig::new(LogAddress::from(LEDGER), device(&a));
    let ledger = rolegate::access::role_ledger::RoleLedger::new(cfg, store, identity).with_metrics(metrics.clone());

    genesis(&ledger, &a, "A");
    assert_eq!(metrics.appends_accepted_total.get(), 1);
    assert_eq!(metrics.moderators.get(), 1);
    assert_eq!(metrics.role_ledger_entries.get(), 1);

    let text = metrics.render().expect("render");
    assert!(text.contains("rolegate_appends_accepted_total 1"));
    assert!(text.contains("rolegate_moderators 1"));
}
