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

use proptest::prelude::*;

use common::*;
use rolegate::access::role_state::RoleRecord;
use rolegate::core::{
    log::entry::LogEntry,
    log::store::CausalStore,
    security::keystore::DeviceKey,
    types::{CausalPoint, Role},
};

struct Fixture {
    keys: Vec<DeviceKey>,
    prefix: Vec<LogEntry>,
    concurrent: Vec<LogEntry>,
    merge: LogEntry,
}

/// World prefix, then conflicting grants authored concurrently at the same point, then a merge.
fn fixture() -> Fixture {
    let keys: Vec<DeviceKey> = (1..=3).map(key).collect();
    let (a, b, c) = (&keys[0], &keys[1], &keys[2]);
    let ledger = new_ledger(a);
    populate(&ledger, a, b, c);
    let prefix = ledger
        .store()
        .linearize(&ledger.store().heads())
        .iter()
        .map(|e| (**e).clone())
        .collect();

    let p = ledger.store().heads();
    let concurrent: Vec<LogEntry> = [
        (a, RoleRecord::revoke("C")),
        (c, RoleRecord::revoke("A")),
        (a, RoleRecord::grant("B", Role::Moderator)),
        (b, RoleRecord::grant("C", Role::Member)),
        (c, RoleRecord::grant_device(device(b), Role::Moderator)),
        (b, RoleRecord::revoke("A")),
    ]
    .into_iter()
    .map(|(k, rec)| ledger.record_entry_at(k, &rec, &p).expect("entry"))
    .collect();
    for e in &concurrent {
        ledger.ingest(e.clone()).expect("ingest");
    }
    let merge = ledger
        .record_entry(a, &RoleRecord::grant("D", Role::Member))
        .expect("entry");

    Fixture {
        keys,
        prefix,
        concurrent,
        merge,
    }
}

fn replay(fx: &Fixture, order: &[usize]) -> (CausalPoint, Arc<rolegate::access::role_state::RoleState>) {
    let ledger = ledger_on(Arc::new(CausalStore::new()), &fx.keys[0]);
    for e in &fx.prefix {
        ledger.ingest(e.clone()).expect("prefix");
    }
    for &i in order {
        ledger.ingest(fx.concurrent[i].clone()).expect("concurrent");
    }
    ledger.ingest(fx.merge.clone()).expect("merge");
    let head = ledger.head_point();
    (head, ledger.current())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_arrival_order_materializes_the_same_state(
        order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let fx = fixture();
        let (ref_head, reference) = replay(&fx, &(0..6).collect::<Vec<_>>());
        let (head, state) = replay(&fx, &order);

        prop_assert_eq!(head, ref_head);
        prop_assert_eq!(state.accounts(), reference.accounts());
        prop_assert_eq!(state.devices(), reference.devices());
        prop_assert_eq!(state.outcomes(), reference.outcomes());
        prop_assert_eq!(state.digest(), reference.digest());
        prop_assert!(state.moderator_count() >= 1);
    }

    #[test]
    fn no_grant_sequence_removes_the_last_moderator(
        ops in proptest::collection::vec((0..3usize, 0..4usize, 0..3u8), 1..24)
    ) {
        let keys: Vec<DeviceKey> = (1..=3).map(key).collect();
        let ledger = new_ledger(&keys[0]);
        populate(&ledger, &keys[0], &keys[1], &keys[2]);

        let accounts = ["A", "B", "C", "D"];
        for (issuer, target, change) in ops {
            let record = match change {
                0 => RoleRecord::grant(accounts[target], Role::Moderator),
                1 => RoleRecord::grant(accounts[target], Role::Member),
                _ => RoleRecord::revoke(accounts[target]),
            };
            grant(&ledger, &keys[issuer], record);
            prop_assert!(ledger.current().moderator_count() >= 1);
        }
    }
}
