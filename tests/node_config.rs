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

use std::collections::BTreeSet;
use std::time::Duration;

use rolegate::access::{base_list::Writer, controller::TAG_ROLE_AWARE};
use rolegate::core::{
    config::{ConfigError, NodeConfig},
    types::{LogAddress, Role},
};

const CREATOR: &str = "0101010101010101010101010101010101010101010101010101010101010101";

fn sample() -> String {
    format!(
        r#"
[ledger]
address = "rolegate/role-ledger"
identity_log = "rolegate/identity"
creator = "{CREATOR}"
sync_timeout_ms = 2500

[[governed]]
tag = "role-aware"
[governed.controller]
address = "chat/general"
role_ledger_address = "rolegate/role-ledger"
default_role = "member"
allowed_roles_by_operation = {{ post = ["member", "moderator"], pin = ["moderator"] }}

[[governed]]
tag = "base-list"
[governed.controller]
address = "announcements"
writers = ["{CREATOR}"]
"#
    )
}

#[test]
fn full_config_parses_with_defaults() {
    let cfg = NodeConfig::from_toml(&sample()).expect("parse");
    assert_eq!(cfg.node.data_dir, "./data");
    assert_eq!(cfg.http.listen, "127.0.0.1:9100");
    assert_eq!(cfg.ledger.writers, BTreeSet::from([Writer::Any]));
    assert_eq!(cfg.sync_timeout(), Duration::from_millis(2500));
    assert!(cfg.writers.is_none());

    let ledger = cfg.ledger_config().expect("ledger config");
    assert_eq!(ledger.address, LogAddress::from("rolegate/role-ledger"));
    assert_eq!(ledger.creator.to_hex(), CREATOR);

    assert_eq!(cfg.governed.len(), 2);
    assert_eq!(cfg.governed[0].tag, TAG_ROLE_AWARE);
    let chat = &cfg.governed[0].controller;
    assert_eq!(chat.default_role, Some(Role::Member));
    assert_eq!(chat.allowed_roles_by_operation.len(), 2);
    assert_eq!(cfg.governed[1].controller.writers.len(), 1);
}

#[test]
fn bad_creator_and_bad_toml_are_reported() {
    let raw = sample().replace(&format!("creator = \"{CREATOR}\""), "creator = \"beef\"");
    let cfg = NodeConfig::from_toml(&raw).expect("parse");
    assert!(matches!(cfg.creator(), Err(ConfigError::BadCreator)));
    assert!(matches!(
        NodeConfig::from_toml("[ledger]\naddress = 3\n"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn load_reads_file_and_reports_missing_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("rolegate.toml");
    std::fs::write(&path, sample()).expect("write");
    let cfg = NodeConfig::load(path.to_str().expect("utf8 path")).expect("load");
    assert_eq!(cfg.governed.len(), 2);

    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        NodeConfig::load(missing.to_str().expect("utf8 path")),
        Err(ConfigError::Read { .. })
    ));
}
