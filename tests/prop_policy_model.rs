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

use std::collections::BTreeSet;

use proptest::prelude::*;

use common::*;
use rolegate::access::{
    controller::{Denial, Verdict},
    role_aware::{AccessControllerConfig, RoleAwareController},
};
use rolegate::core::types::{LogAddress, Role};

const OPS: [&str; 3] = ["post", "pin", "delete"];

fn roles() -> impl Strategy<Value = BTreeSet<Role>> {
    proptest::collection::btree_set(prop_oneof![Just(Role::Member), Just(Role::Moderator)], 0..=2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Accept iff the signer's role is listed for the operation.
    #[test]
    fn decision_matches_policy_table(
        table in proptest::collection::vec(roles(), 3),
        writer in 0..3usize,
        op in 0..3usize,
    ) {
        let w = world();
        let mut policy = AccessControllerConfig::new(LogAddress::from(LEDGER));
        for (name, allowed) in OPS.iter().zip(&table) {
            if !allowed.is_empty() {
                policy = policy.allow(*name, allowed.iter().copied());
            }
        }
        prop_assume!(!policy.allowed_roles_by_operation.is_empty());
        let chat = RoleAwareController::new(
            LogAddress::from(CHAT),
            policy,
            w.ledger.clone(),
            std::time::Duration::from_millis(50),
        ).expect("controller");

        let (signer, role) = [(&w.a, Role::Moderator), (&w.b, Role::Member), (&w.c, Role::Moderator)][writer];
        let entry = post(w.ledger.store(), signer, CHAT, OPS[op]);
        let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().expect("runtime");
        let verdict = rt.block_on(chat.can_append(&entry));

        let expected = if table[op].is_empty() {
            Verdict::deny(Denial::UnknownOperation(OPS[op].into()))
        } else if table[op].contains(&role) {
            Verdict::Accept
        } else {
            Verdict::deny(Denial::RoleNotAllowed { role, operation: OPS[op].into() })
        };
        prop_assert_eq!(verdict, expected);
    }
}
