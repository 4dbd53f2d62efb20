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
use std::fs;

use rolegate::access::{
    base_list::Writer,
    writer_list::{
        canonical_writer_list_bytes, load_and_verify_writer_list, parse_writer_list_toml,
        verify_writer_list, WriterListError, WriterListPolicy,
    },
};
use rolegate::core::security::keystore::{DeviceKey, SignerBackend};

const LOG: &str = "rolegate/role-ledger";
const ISSUED: u64 = 1768336425892;
const EXPIRES: u64 = 1768336485892;

fn signer() -> DeviceKey {
    DeviceKey::from_seed([11; 32]).expect("seed key")
}

fn writers() -> BTreeSet<Writer> {
    let dev = DeviceKey::from_seed([12; 32]).expect("seed key").identity().device_id;
    BTreeSet::from([Writer::Device(dev)])
}

fn document(ks: &DeviceKey, log: &str, writers: &BTreeSet<Writer>) -> String {
    let msg = canonical_writer_list_bytes(log, ISSUED, EXPIRES, writers);
    let sig = ks.sign(&msg).expect("sign");
    let listed: Vec<String> = writers.iter().map(|w| format!("\"{w}\"")).collect();
    format!(
        "version = 1\nlog = \"{}\"\nissued_at_ms = {}\nexpires_at_ms = {}\nwriters = [{}]\n\nsignature_hex = \"{}\"\n",
        log,
        ISSUED,
        EXPIRES,
        listed.join(", "),
        hex::encode(sig.0)
    )
}

fn pinned(ks: &DeviceKey) -> String {
    hex::encode(ks.public_key().0)
}

#[test]
fn writer_list_loads_and_verifies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ks = signer();
    let path = dir.path().join("writers.toml");
    fs::write(&path, document(&ks, LOG, &writers())).expect("write");

    let mut pol = WriterListPolicy::default_with_now(ISSUED + 1);
    pol.expected_log = Some(LOG);

    let list = load_and_verify_writer_list(path.to_str().expect("utf8 path"), &pinned(&ks), &pol)
        .expect("load and verify");
    assert_eq!(list.writers, writers());
    assert_eq!(list.log.as_str(), LOG);

    let controller = list.into_controller();
    assert_eq!(controller.allowed_writers(), &writers());
    assert!(!controller.is_open());
}

#[test]
fn validity_window_is_enforced() {
    let ks = signer();
    let doc = document(&ks, LOG, &writers());

    let early = WriterListPolicy::default_with_now(ISSUED - 1);
    assert_eq!(verify_writer_list(&doc, &pinned(&ks), &early), Err(WriterListError::NotYetValid));

    let late = WriterListPolicy::default_with_now(EXPIRES + 10);
    assert_eq!(verify_writer_list(&doc, &pinned(&ks), &late), Err(WriterListError::Expired));

    let mut graced = WriterListPolicy::default_with_now(EXPIRES + 10);
    graced.grace_ms = 10;
    assert!(verify_writer_list(&doc, &pinned(&ks), &graced).is_ok());

    let mut strict = WriterListPolicy::default_with_now(ISSUED + 5_000);
    strict.max_age_ms = 1_000;
    assert_eq!(verify_writer_list(&doc, &pinned(&ks), &strict), Err(WriterListError::TooOld));
}

#[test]
fn tampering_and_wrong_binding_are_rejected() {
    let ks = signer();
    let pol = WriterListPolicy::default_with_now(ISSUED + 1);
    let doc = document(&ks, LOG, &writers());

    let widened = doc.replace("writers = [", "writers = [\"*\", ");
    assert_eq!(
        verify_writer_list(&widened, &pinned(&ks), &pol),
        Err(WriterListError::BadSignature)
    );

    let other_key = DeviceKey::from_seed([13; 32]).expect("seed key");
    assert_eq!(
        verify_writer_list(&doc, &pinned(&other_key), &pol),
        Err(WriterListError::BadSignature)
    );
    assert_eq!(verify_writer_list(&doc, "zz", &pol), Err(WriterListError::BadPubkey));

    let mut bound = WriterListPolicy::default_with_now(ISSUED + 1);
    bound.expected_log = Some("chat/general");
    assert_eq!(verify_writer_list(&doc, &pinned(&ks), &bound), Err(WriterListError::LogMismatch));

    let empty = document(&ks, LOG, &BTreeSet::new());
    assert_eq!(verify_writer_list(&empty, &pinned(&ks), &pol), Err(WriterListError::Empty));
}

#[test]
fn parse_reports_invalid_writers() {
    let raw = "version = 1\nlog = \"x\"\nissued_at_ms = 0\nexpires_at_ms = 1\nwriters = [\"*\", \"nothex\"]\nsignature_hex = \"\"\n";
    assert_eq!(
        parse_writer_list_toml(raw),
        Err(WriterListError::InvalidWriter("nothex".to_string()))
    );
    assert_eq!(parse_writer_list_toml("version = "), Err(WriterListError::Parse));

    let open = raw.replace(", \"nothex\"", "");
    assert_eq!(parse_writer_list_toml(&open), Ok(BTreeSet::from([Writer::Any])));
}
