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

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rolegate::access::{
    controller::Verdict,
    identity::{DeviceLinkRecord, IdentityResolver, LinkAction},
    role_aware::{AccessControllerConfig, RoleAwareController},
    role_ledger::{RoleLedger, RoleLedgerConfig},
    role_state::RoleRecord,
};
use rolegate::core::{
    log::entry::LogEntry,
    log::store::CausalStore,
    security::keystore::{DeviceKey, SignerBackend},
    types::{AccountId, DeviceId, LogAddress, OperationKind, Role},
};

pub const LEDGER: &str = "rolegate/role-ledger";
pub const IDENTITY: &str = "rolegate/identity";
pub const CHAT: &str = "chat/general";

pub fn key(n: u8) -> DeviceKey {
    DeviceKey::from_seed([n; 32]).expect("seed key")
}

pub fn device(k: &DeviceKey) -> DeviceId {
    k.identity().device_id
}

pub fn ledger_on(store: Arc<CausalStore>, creator: &DeviceKey) -> Arc<RoleLedger> {
    let identity = IdentityResolver::new(LogAddress::from(IDENTITY), store.clone());
    let cfg = RoleLedgerConfig::new(LogAddress::from(LEDGER), device(creator));
    Arc::new(RoleLedger::new(cfg, store, identity))
}

pub fn new_ledger(creator: &DeviceKey) -> Arc<RoleLedger> {
    ledger_on(Arc::new(CausalStore::new()), creator)
}

/// Append the genesis grant for `account`, signed by `creator`.
pub fn genesis(ledger: &RoleLedger, creator: &DeviceKey, account: &str) -> LogEntry {
    let entry = ledger
        .genesis_entry(creator, AccountId::from(account))
        .expect("genesis entry");
    let verdict = ledger.append(entry.clone()).expect("append genesis");
    assert_eq!(verdict, Verdict::Accept);
    entry
}

fn link_record(signer: &DeviceKey, ledger: &RoleLedger, rec: DeviceLinkRecord) -> LogEntry {
    let heads = ledger.store().heads();
    let entry = ledger
        .identity()
        .link_entry(signer, &rec, heads.heads().iter().copied())
        .expect("link entry");
    ledger.ingest(entry.clone()).expect("ingest link");
    entry
}

/// `signer` links `dev` to `account` at the current heads.
pub fn link(ledger: &RoleLedger, signer: &DeviceKey, account: &str, dev: &DeviceKey) -> LogEntry {
    link_record(
        signer,
        ledger,
        DeviceLinkRecord {
            account: AccountId::from(account),
            device: device(dev),
            action: LinkAction::Link,
        },
    )
}

/// `signer` unlinks `dev` from `account` at the current heads.
pub fn unlink(ledger: &RoleLedger, signer: &DeviceKey, account: &str, dev: &DeviceKey) -> LogEntry {
    link_record(
        signer,
        ledger,
        DeviceLinkRecord {
            account: AccountId::from(account),
            device: device(dev),
            action: LinkAction::Unlink,
        },
    )
}

/// Role entry by `signer` at the current heads, appended through the ledger gate.
pub fn grant(ledger: &RoleLedger, signer: &DeviceKey, record: RoleRecord) -> LogEntry {
    let entry = ledger.record_entry(signer, &record).expect("role entry");
    let verdict = ledger.append(entry.clone()).expect("append role entry");
    assert_eq!(verdict, Verdict::Accept);
    entry
}

/// Entry on `log` by `signer` at the current heads. Not stored.
pub fn post(store: &CausalStore, signer: &DeviceKey, log: &str, op: &str) -> LogEntry {
    let heads = store.heads();
    LogEntry::new_signed(
        LogAddress::from(log),
        OperationKind::from(op),
        b"hello".to_vec(),
        heads.heads().iter().copied(),
        signer,
    )
    .expect("post entry")
}

pub fn chat_policy() -> AccessControllerConfig {
    AccessControllerConfig::new(LogAddress::from(LEDGER))
        .allow("post", [Role::Member, Role::Moderator])
        .allow("pin", [Role::Moderator])
}

pub fn chat_controller(ledger: &Arc<RoleLedger>, sync_timeout: Duration) -> RoleAwareController {
    RoleAwareController::new(LogAddress::from(CHAT), chat_policy(), ledger.clone(), sync_timeout)
        .expect("chat controller")
}

/// Accounts A (moderator, device a), B (member, device b), C (moderator, device c).
pub struct World {
    pub a: DeviceKey,
    pub b: DeviceKey,
    pub c: DeviceKey,
    pub ledger: Arc<RoleLedger>,
}

pub fn world() -> World {
    let (a, b, c) = (key(1), key(2), key(3));
    let ledger = new_ledger(&a);
    populate(&ledger, &a, &b, &c);
    World { a, b, c, ledger }
}

pub fn populate(ledger: &RoleLedger, a: &DeviceKey, b: &DeviceKey, c: &DeviceKey) {
    genesis(ledger, a, "A");
    link(ledger, a, "A", a);
    link(ledger, b, "B", b);
    link(ledger, c, "C", c);
    grant(ledger, a, RoleRecord::grant("B", Role::Member));
    grant(ledger, a, RoleRecord::grant("C", Role::Moderator));
}
