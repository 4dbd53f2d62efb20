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

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rolegate::access::role_state::{GrantTarget, RoleState};
use rolegate::core::types::{AccountId, DeviceId, Role};

#[derive(Clone, Debug, Arbitrary)]
enum Subject {
    Account(String),
    Device([u8; 32]),
}

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    assignments: Vec<(Subject, bool)>,
    index: u16,
}

fuzz_target!(|inp: Input| {
    let state = RoleState::from_assignments(inp.assignments.into_iter().map(|(subject, moderator)| {
        let target = match subject {
            Subject::Account(name) => GrantTarget::Account(AccountId::from(name)),
            Subject::Device(id) => GrantTarget::Device(DeviceId(id)),
        };
        (target, if moderator { Role::Moderator } else { Role::Member })
    }));
    let assignments = state.assignments();
    if assignments.is_empty() {
        return;
    }
    let root = state.digest();
    let (target, _) = &assignments[inp.index as usize % assignments.len()];
    let proof = state.prove(target).expect("assigned target has a proof");
    assert!(proof.verify(&root));
});
