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

use std::time::Duration;

use common::*;
use rolegate::access::{
    address::{path_join, ControllerManifest, ManifestError},
    base_list::{BaseListController, Writer},
    controller::{AccessController, ControllerKind, Denial, Verdict, TAG_BASE_LIST, TAG_ROLE_AWARE},
    registry::{
        ControllerConfig, ControllerContext, ControllerError, ControllerFactory, ControllerRegistry,
        RegistryError,
    },
};
use rolegate::core::{
    log::store::CausalStore,
    types::{LogAddress, Role},
};

fn no_ledger_build(
    _cfg: &ControllerConfig,
    _ctx: &ControllerContext,
) -> Result<AccessController, ControllerError> {
    Err(ControllerError::MissingRoleLedger)
}

#[test]
fn path_join_normalizes_segments() {
    assert_eq!(path_join(["a/", "/b", "./c"]), "a/b/c");
    assert_eq!(path_join(Vec::<&str>::new()), ".");
    assert_eq!(path_join(["", ""]), ".");
    assert_eq!(path_join(["/rolegate", "role-aware", "chat/general"]), "/rolegate/role-aware/chat/general");
    assert_eq!(path_join(["a//b", "c/../d"]), "a/b/d");
    assert_eq!(path_join(["/", ".."]), "/");
    assert_eq!(path_join(["..", "a"]), "../a");
}

#[test]
fn manifest_addresses_round_trip() {
    let m = ControllerManifest::new(TAG_ROLE_AWARE, LogAddress::from(CHAT));
    assert_eq!(m.address(), "/rolegate/role-aware/chat/general");
    assert_eq!(ControllerManifest::parse(&m.address()), Ok(m));
    assert_eq!(
        ControllerManifest::parse("/elsewhere/x/y"),
        Err(ManifestError::NotAManifest)
    );
    assert_eq!(ControllerManifest::parse("/rolegate/base-list"), Err(ManifestError::MissingLog));
}

#[test]
fn registration_is_idempotent_and_conflicts_are_errors() {
    let mut reg = ControllerRegistry::with_builtin();
    assert_eq!(reg.tags().collect::<Vec<_>>(), vec![TAG_BASE_LIST, TAG_ROLE_AWARE]);

    reg.register(TAG_BASE_LIST, ControllerFactory::BASE_LIST)
        .expect("same pair is a no-op");
    assert_eq!(
        reg.register(TAG_BASE_LIST, ControllerFactory::ROLE_AWARE),
        Err(RegistryError::Conflict {
            tag: TAG_BASE_LIST.to_string()
        })
    );
    let custom = ControllerFactory {
        kind: ControllerKind::RoleAware,
        name: "test.no-ledger",
        build: no_ledger_build,
    };
    assert!(matches!(
        reg.register(TAG_ROLE_AWARE, custom),
        Err(RegistryError::Conflict { .. })
    ));

    // Identity is kind plus name, whatever the constructor.
    let renamed_builtin = ControllerFactory {
        name: "test.no-ledger",
        ..ControllerFactory::ROLE_AWARE
    };
    assert_eq!(renamed_builtin, custom);
    assert_ne!(renamed_builtin, ControllerFactory::ROLE_AWARE);
    reg.register("custom", custom).expect("new tag");
    reg.register("custom", renamed_builtin)
        .expect("same kind and name is the same factory");

    reg.register("my-list", ControllerFactory::builtin(ControllerKind::BaseList))
        .expect("new tag");
    reg.register("my-list", ControllerFactory::BASE_LIST)
        .expect("again");
    assert!(matches!(
        reg.register("bad/tag", ControllerFactory::BASE_LIST),
        Err(RegistryError::InvalidTag(_))
    ));
    assert!(matches!(
        reg.register("", ControllerFactory::BASE_LIST),
        Err(RegistryError::InvalidTag(_))
    ));
}

#[tokio::test]
async fn base_list_through_registry() {
    let (a, b) = (key(1), key(2));
    let reg = ControllerRegistry::with_builtin();
    let ctx = ControllerContext::default();
    let cfg = ControllerConfig::base_list(LogAddress::from(CHAT), [Writer::Device(device(&a))]);

    let controller = reg.construct(TAG_BASE_LIST, &cfg, &ctx).expect("construct");
    assert_eq!(controller.kind(), ControllerKind::BaseList);
    assert_eq!(controller.address(), &LogAddress::from(CHAT));

    let store = CausalStore::new();
    assert_eq!(controller.can_append(&post(&store, &a, CHAT, "any")).await, Verdict::Accept);
    assert_eq!(
        controller.can_append(&post(&store, &b, CHAT, "any")).await,
        Verdict::deny(Denial::NotInAllowList)
    );
    assert_eq!(controller.allowed_writers().len(), 1);
}

#[test]
fn wildcard_admits_any_signer() {
    let list = BaseListController::new(LogAddress::from(CHAT), ["*".parse::<Writer>().expect("wildcard")]);
    let store = CausalStore::new();
    assert!(list.is_open());
    assert_eq!(list.can_append(&post(&store, &key(42), CHAT, "x")), Verdict::Accept);
    assert_eq!(
        list.can_append(&post(&store, &key(42), "other", "x")),
        Verdict::deny(Denial::ForeignLog(LogAddress::from("other")))
    );
}

#[test]
fn configuration_errors_are_reported_at_construction() {
    let reg = ControllerRegistry::with_builtin();
    let w = world();
    let ctx = ControllerContext::new(Duration::from_millis(10));
    let with_ledger = ControllerContext::new(Duration::from_millis(10)).with_ledger(w.ledger.clone());

    let mut cfg = ControllerConfig::role_aware(LogAddress::from(CHAT), chat_policy());
    cfg.role_ledger_address = None;
    assert_eq!(
        reg.construct(TAG_ROLE_AWARE, &cfg, &with_ledger).err(),
        Some(RegistryError::Construct {
            tag: TAG_ROLE_AWARE.to_string(),
            source: ControllerError::MissingRoleLedger,
        })
    );

    let cfg = ControllerConfig::role_aware(LogAddress::from(CHAT), chat_policy());
    assert_eq!(
        reg.construct(TAG_ROLE_AWARE, &cfg, &ctx).err(),
        Some(RegistryError::Construct {
            tag: TAG_ROLE_AWARE.to_string(),
            source: ControllerError::RoleLedgerUnavailable(LogAddress::from(LEDGER)),
        })
    );
    let controller = reg
        .construct(TAG_ROLE_AWARE, &cfg, &with_ledger)
        .expect("ledger available");
    assert_eq!(controller.kind(), ControllerKind::RoleAware);

    let empty = ControllerConfig::base_list(LogAddress::from(CHAT), []);
    assert!(matches!(
        reg.construct(TAG_BASE_LIST, &empty, &ctx),
        Err(RegistryError::Construct {
            source: ControllerError::EmptyAllowList,
            ..
        })
    ));
    let sloppy = ControllerConfig::base_list(LogAddress::from("chat//general"), [Writer::Any]);
    assert!(matches!(
        reg.construct(TAG_BASE_LIST, &sloppy, &ctx),
        Err(RegistryError::Construct {
            source: ControllerError::InvalidAddress(_),
            ..
        })
    ));
    assert_eq!(
        reg.construct("nope", &cfg, &ctx).err(),
        Some(RegistryError::UnknownType("nope".to_string()))
    );
}

#[tokio::test]
async fn manifest_reopens_equivalent_controller() {
    let w = world();
    let reg = ControllerRegistry::with_builtin();
    let ctx = ControllerContext::default().with_ledger(w.ledger.clone());
    let cfg = ControllerConfig::role_aware(LogAddress::from(CHAT), chat_policy().with_default_role(None));

    let manifest = ControllerManifest::parse("/rolegate/role-aware/chat/general").expect("manifest");
    let controller = reg.open(&manifest, &cfg, &ctx).expect("open");
    let e = post(w.ledger.store(), &w.b, CHAT, "post");
    assert!(controller.can_append(&e).await.is_accepted());

    let other = ControllerManifest::new(TAG_ROLE_AWARE, LogAddress::from("chat/other"));
    assert!(reg.open(&other, &cfg, &ctx).is_err());
}

#[test]
fn config_parses_from_toml() {
    let raw = format!(
        r#"
address = "{CHAT}"
role_ledger_address = "{LEDGER}"
default_role = "member"

[allowed_roles_by_operation]
post = ["member", "moderator"]
pin = ["moderator"]
"#
    );
    let cfg: ControllerConfig = toml::from_str(&raw).expect("parse");
    assert_eq!(cfg.default_role, Some(Role::Member));
    assert_eq!(cfg.allowed_roles_by_operation.len(), 2);
    assert!(cfg.writers.is_empty());
}
