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

//! Commitment to a role state: a Merkle tree over its `(target, role)` assignments, in target
//! order, so replicas can compare what they derived and hand out proofs for single assignments.
//!
//! leaf = H( "rolegate/role-leaf/v1" || target || role )
//! node = H( "rolegate/role-node/v1" || left || right )
//! root = H( "rolegate/role-root/v1" || leaf count (u64 BE) || top )
//!
//! A level with an odd number of nodes carries its last node up unchanged. A target is a tag byte
//! followed by the length-prefixed account name or the 32-byte device id.

use crate::access::role_state::GrantTarget;
use crate::core::types::{sha256, Role};

/// 32-byte digest.
pub type Hash32 = [u8; 32];

const LEAF_DOMAIN: &[u8] = b"rolegate/role-leaf/v1";
const NODE_DOMAIN: &[u8] = b"rolegate/role-node/v1";
const ROOT_DOMAIN: &[u8] = b"rolegate/role-root/v1";

const TAG_ACCOUNT: u8 = 0;
const TAG_DEVICE: u8 = 1;

/// Sibling met on the way from a leaf to the top.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Sibling hashes in on the left.
    Left(Hash32),
    /// Sibling hashes in on the right.
    Right(Hash32),
}

/// Proof that `target` holds `role` in a committed role state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleProof {
    /// Account or device.
    pub target: GrantTarget,
    /// Role claimed for it.
    pub role: Role,
    /// Number of assignments committed by the root.
    pub leaf_count: u64,
    /// Siblings, leaf level first.
    pub path: Vec<Step>,
}

impl RoleProof {
    /// True if this assignment is committed by `root`.
    pub fn verify(&self, root: &Hash32) -> bool {
        let top = self
            .path
            .iter()
            .fold(leaf_hash(&self.target, self.role), |cur, step| match step {
                Step::Left(sibling) => node_hash(sibling, &cur),
                Step::Right(sibling) => node_hash(&cur, sibling),
            });
        seal(self.leaf_count, Some(&top)) == *root
    }
}

fn leaf_hash(target: &GrantTarget, role: Role) -> Hash32 {
    let mut buf = LEAF_DOMAIN.to_vec();
    match target {
        GrantTarget::Account(account) => {
            let name = account.as_str().as_bytes();
            buf.push(TAG_ACCOUNT);
            buf.extend_from_slice(&(name.len() as u64).to_be_bytes());
            buf.extend_from_slice(name);
        }
        GrantTarget::Device(device) => {
            buf.push(TAG_DEVICE);
            buf.extend_from_slice(&device.0);
        }
    }
    buf.extend_from_slice(role.as_str().as_bytes());
    sha256(&buf)
}

fn node_hash(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut buf = Vec::with_capacity(NODE_DOMAIN.len() + 64);
    buf.extend_from_slice(NODE_DOMAIN);
    buf.extend_from_slice(left);
    buf.extend_from_slice(right);
    sha256(&buf)
}

fn seal(leaf_count: u64, top: Option<&Hash32>) -> Hash32 {
    let mut buf = Vec::with_capacity(ROOT_DOMAIN.len() + 8 + 32);
    buf.extend_from_slice(ROOT_DOMAIN);
    buf.extend_from_slice(&leaf_count.to_be_bytes());
    if let Some(top) = top {
        buf.extend_from_slice(top);
    }
    sha256(&buf)
}

fn leaves(assignments: &[(GrantTarget, Role)]) -> Vec<Hash32> {
    assignments.iter().map(|(t, r)| leaf_hash(t, *r)).collect()
}

fn next_level(level: &[Hash32]) -> Vec<Hash32> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => node_hash(left, right),
            _ => pair[0],
        })
        .collect()
}

/// Root over assignments sorted by target.
pub(crate) fn root(assignments: &[(GrantTarget, Role)]) -> Hash32 {
    let mut level = leaves(assignments);
    while level.len() > 1 {
        level = next_level(&level);
    }
    seal(assignments.len() as u64, level.first())
}

/// Proof for the assignment at `index` of the sorted assignments.
pub(crate) fn prove(assignments: &[(GrantTarget, Role)], index: usize) -> Option<RoleProof> {
    let (target, role) = assignments.get(index)?.clone();
    let mut level = leaves(assignments);
    let mut idx = index;
    let mut path = Vec::new();
    while level.len() > 1 {
        if let Some(sibling) = level.get(idx ^ 1) {
            path.push(if idx % 2 == 1 {
                Step::Left(*sibling)
            } else {
                Step::Right(*sibling)
            });
        }
        level = next_level(&level);
        idx /= 2;
    }
    Some(RoleProof {
        target,
        role,
        leaf_count: assignments.len() as u64,
        path,
    })
}
