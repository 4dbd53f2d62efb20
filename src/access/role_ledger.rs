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
#![deny(missing_docs)]

//! Role ledger: the replicated log of role grants and its materialization.
//!
//! Materialization at a causal point walks the entries in the point's closure in store
//! linearization order (parents first, concurrent entries by ascending hash). Identity-log
//! entries update the device directory as they are reached. Ledger entries are judged:
//! 1. signers outside the ledger allow-list have no effect;
//! 2. the first parentless `Grant(Moderator)` on an account, signed by the configured creator,
//!    is the genesis and applies unconditionally; other parentless entries are ignored;
//! 3. every other grant applies only if its issuer, resolved at the grant's own parents, holds
//!    `moderator` in the state built so far;
//! 4. a grant that would leave no account-scoped moderator is reverted.
//!
//! Results are immutable snapshots cached per causal point. A replay cursor is extended in
//! place when a newer point only appends to the order it already walked.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::access::base_list::{BaseListController, Writer};
use crate::access::controller::Verdict;
use crate::access::identity::{DeviceDirectory, IdentityResolver};
use crate::access::role_state::{GrantOutcome, GrantTarget, RoleChange, RoleRecord, RoleState, OP_ROLE};
use crate::core::{
    log::entry::{EntryError, LogEntry},
    log::store::{CausalStore, StoreError, SyncError},
    security::keystore::SignerBackend,
    types::{AccountId, CausalPoint, DeviceId, EntryHash, Identity, LogAddress, OperationKind, Role},
};
use crate::monitoring::metrics::Metrics;

/// Default number of cached materializations.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

const EVENT_CAPACITY: usize = 64;

/// Role ledger configuration.
#[derive(Clone, Debug)]
pub struct RoleLedgerConfig {
    /// Ledger log address.
    pub address: LogAddress,
    /// Device allowed to sign the genesis grant.
    pub creator: DeviceId,
    /// Devices whose ledger entries take effect. The creator is always allowed.
    pub writers: BTreeSet<Writer>,
    /// Maximum cached materializations.
    pub cache_capacity: usize,
}

impl RoleLedgerConfig {
    /// Ledger at `address` created by `creator`, open to every signer.
    pub fn new(address: LogAddress, creator: DeviceId) -> Self {
        Self {
            address,
            creator,
            writers: BTreeSet::from([Writer::Any]),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// A role assignment changed at the ledger head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleEvent {
    /// Account or device whose role changed.
    pub subject: GrantTarget,
    /// Role before.
    pub before: Option<Role>,
    /// Role after.
    pub after: Option<Role>,
}

/// Roles and device membership materialized at one causal point.
#[derive(Clone, Debug, Default)]
pub struct LedgerView {
    /// Role assignments and per-entry outcomes.
    pub roles: Arc<RoleState>,
    /// Device → account links.
    pub directory: Arc<DeviceDirectory>,
}

/// Replay of a parent-closed set of entries, in linearized order.
#[derive(Default)]
struct Replay {
    order: Vec<EntryHash>,
    position: BTreeMap<EntryHash, usize>,
    frontier: BTreeSet<EntryHash>,
    // Identity-log entries at or before each replayed entry.
    identity_past: BTreeMap<EntryHash, Arc<BTreeSet<EntryHash>>>,
    links: Vec<Arc<LogEntry>>,
    directory: DeviceDirectory,
    roles: RoleState,
    genesis_seen: bool,
}

impl Replay {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn contains(&self, hash: &EntryHash) -> bool {
        self.position.contains_key(hash)
    }

    fn view(&self) -> LedgerView {
        LedgerView {
            roles: Arc::new(self.roles.clone()),
            directory: Arc::new(self.directory.clone()),
        }
    }

    /// True if every replayed entry is in the closure of `point`, whose unreplayed part is `fresh`.
    fn is_below(&self, point: &CausalPoint, fresh: &[Arc<LogEntry>]) -> bool {
        let parents: BTreeSet<&EntryHash> = fresh.iter().flat_map(|e| e.parents.iter()).collect();
        self.frontier
            .iter()
            .all(|h| point.heads().contains(h) || parents.contains(&h))
    }

    /// True if `fresh`, linearized on its own, continues the replayed order.
    ///
    /// An entry whose parents are all replayed becomes ready right after its last parent; it
    /// must not outrank any entry replayed from there on.
    fn continues_with(&self, fresh: &[Arc<LogEntry>]) -> bool {
        fresh.iter().all(|e| {
            if e.parents.iter().any(|p| !self.contains(p)) {
                return true;
            }
            let start = e
                .parents
                .iter()
                .filter_map(|p| self.position.get(p))
                .max()
                .map_or(0, |i| i + 1);
            self.order[start..].iter().all(|h| h < &e.hash)
        })
    }

    /// Record `entry` as replayed and return the identity entries in its past.
    fn admit(&mut self, entry: &Arc<LogEntry>, identity_log: &LogAddress) -> Arc<BTreeSet<EntryHash>> {
        let mut past: Option<Arc<BTreeSet<EntryHash>>> = None;
        for parent in &entry.parents {
            let Some(p) = self.identity_past.get(parent) else { continue };
            past = Some(match past {
                None => p.clone(),
                Some(acc) if p.is_subset(&acc) => acc,
                Some(acc) if acc.is_subset(p) => p.clone(),
                Some(acc) => Arc::new(acc.union(p).copied().collect()),
            });
        }
        let mut past = past.unwrap_or_default();
        if &entry.log == identity_log {
            Arc::make_mut(&mut past).insert(entry.hash);
            self.directory.apply_entry(entry);
            self.links.push(entry.clone());
        }

        for parent in &entry.parents {
            self.frontier.remove(parent);
        }
        self.frontier.insert(entry.hash);
        self.position.insert(entry.hash, self.order.len());
        self.order.push(entry.hash);
        self.identity_past.insert(entry.hash, past.clone());
        past
    }

    /// Account `device` acted for with exactly the identity entries in `past` applied.
    fn account_at(&self, device: &DeviceId, past: &BTreeSet<EntryHash>) -> Option<AccountId> {
        // `past` is always a subset of the links replayed so far.
        if past.len() == self.links.len() {
            return self.directory.account_of(device).cloned();
        }
        let mut dir = DeviceDirectory::default();
        for link in self.links.iter().filter(|l| past.contains(&l.hash)) {
            dir.apply_entry(link);
        }
        dir.account_of(device).cloned()
    }
}

/// Bounded point → view cache, least recently used evicted first.
struct ViewCache {
    capacity: usize,
    views: BTreeMap<CausalPoint, LedgerView>,
    recency: VecDeque<CausalPoint>,
}

impl ViewCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            views: BTreeMap::new(),
            recency: VecDeque::new(),
        }
    }

    fn get(&mut self, point: &CausalPoint) -> Option<LedgerView> {
        let view = self.views.get(point)?.clone();
        if let Some(i) = self.recency.iter().position(|p| p == point) {
            if let Some(p) = self.recency.remove(i) {
                self.recency.push_back(p);
            }
        }
        Some(view)
    }

    fn insert(&mut self, point: CausalPoint, view: LedgerView) {
        if self.views.contains_key(&point) {
            return;
        }
        while self.views.len() >= self.capacity {
            let Some(oldest) = self.recency.pop_front() else { break };
            self.views.remove(&oldest);
        }
        self.recency.push_back(point.clone());
        self.views.insert(point, view);
    }
}

/// Replicated role ledger over a shared [`CausalStore`].
pub struct RoleLedger {
    cfg: RoleLedgerConfig,
    store: Arc<CausalStore>,
    identity: IdentityResolver,
    gate: BaseListController,
    cache: Mutex<ViewCache>,
    cursor: Mutex<Replay>,
    latest: Mutex<Arc<RoleState>>,
    events: broadcast::Sender<RoleEvent>,
    metrics: Option<Arc<Metrics>>,
}

impl RoleLedger {
    /// Open the ledger over entries already in `store`.
    pub fn new(cfg: RoleLedgerConfig, store: Arc<CausalStore>, identity: IdentityResolver) -> Self {
        let gate = BaseListController::new(
            cfg.address.clone(),
            cfg.writers.iter().copied().chain([Writer::Device(cfg.creator)]),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cache = Mutex::new(ViewCache::new(cfg.cache_capacity));
        let ledger = Self {
            cfg,
            store,
            identity,
            gate,
            cache,
            cursor: Mutex::new(Replay::default()),
            latest: Mutex::new(Arc::default()),
            events,
            metrics: None,
        };
        let head = ledger.role_state_at(&ledger.store.heads());
        debug!(
            ledger = %ledger.cfg.address,
            entries = ledger.store.len_of(&ledger.cfg.address),
            moderators = head.moderator_count(),
            "role ledger opened"
        );
        *ledger.latest_lock() = head;
        ledger
    }

    /// Attach metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self.update_gauges(&self.current());
        self
    }

    /// Ledger log address.
    pub fn address(&self) -> &LogAddress {
        &self.cfg.address
    }

    /// Genesis signer.
    pub fn creator(&self) -> &DeviceId {
        &self.cfg.creator
    }

    /// Identity resolver used for issuers.
    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<CausalStore> {
        &self.store
    }

    /// Allow-list gating appends to the ledger log.
    pub fn gate(&self) -> &BaseListController {
        &self.gate
    }

    /// Subscribe to role changes at the ledger head.
    pub fn subscribe(&self) -> broadcast::Receiver<RoleEvent> {
        self.events.subscribe()
    }

    fn cache_lock(&self) -> MutexGuard<'_, ViewCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cursor_lock(&self) -> MutexGuard<'_, Replay> {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn latest_lock(&self) -> MutexGuard<'_, Arc<RoleState>> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Heads of the ledger log.
    pub fn head_point(&self) -> CausalPoint {
        self.store.heads_of(&self.cfg.address)
    }

    /// Role state at the ledger head.
    pub fn current(&self) -> Arc<RoleState> {
        self.latest_lock().clone()
    }

    /// Role state at `point`, using whatever part of it is stored locally.
    pub fn role_state_at(&self, point: &CausalPoint) -> Arc<RoleState> {
        self.view_at(point).roles
    }

    /// Device membership at `point`, from the same pass as [`RoleLedger::role_state_at`].
    pub fn directory_at(&self, point: &CausalPoint) -> Arc<DeviceDirectory> {
        self.view_at(point).directory
    }

    /// Roles and device membership at `point`.
    ///
    /// Only fully synced points are cached or advance the replay cursor.
    pub fn view_at(&self, point: &CausalPoint) -> LedgerView {
        if let Some(hit) = self.cache_lock().get(point) {
            return hit;
        }
        if !self.store.contains_point(point) {
            return self.materialize(point).view();
        }
        let view = self.view_from_cursor(point);
        self.cache_lock().insert(point.clone(), view.clone());
        view
    }

    fn view_from_cursor(&self, point: &CausalPoint) -> LedgerView {
        let mut cursor = self.cursor_lock();
        let fresh = self.store.linearize_beyond(point, |h| cursor.contains(h));
        if cursor.is_below(point, &fresh) && cursor.continues_with(&fresh) {
            trace!(replayed = cursor.len(), fresh = fresh.len(), "extending role replay");
            self.replay(&mut cursor, &fresh);
            return cursor.view();
        }
        let run = self.materialize(point);
        let view = run.view();
        if run.len() > cursor.len() {
            *cursor = run;
        }
        view
    }

    /// Wait until `point` is stored locally, then materialize it.
    pub async fn role_state_at_synced(
        &self,
        point: &CausalPoint,
        timeout: Duration,
    ) -> Result<Arc<RoleState>, SyncError> {
        self.store.wait_for(point, timeout).await?;
        Ok(self.role_state_at(point))
    }

    /// Gate `entry` with the ledger allow-list and store it if accepted.
    pub fn append(&self, entry: LogEntry) -> Result<Verdict, StoreError> {
        let verdict = self.gate.can_append(&entry);
        if let Some(m) = &self.metrics {
            m.record(&verdict);
        }
        if verdict.is_accepted() {
            self.ingest(entry)?;
        } else {
            debug!(hash = %entry.hash, ?verdict, "role ledger append refused");
        }
        Ok(verdict)
    }

    /// Store a replicated entry and publish role changes if it moved the ledger head.
    ///
    /// Ledger entries from signers outside the allow-list are stored but never take effect.
    /// Returns `false` for duplicates.
    pub fn ingest(&self, entry: LogEntry) -> Result<bool, StoreError> {
        let on_ledger = entry.log == self.cfg.address;
        let inserted = self.store.insert(entry)?;
        if inserted && on_ledger {
            self.refresh();
        }
        Ok(inserted)
    }

    fn refresh(&self) {
        let mut latest = self.latest_lock();
        let next = self.role_state_at(&self.store.heads());
        for event in role_events(&latest, &next) {
            debug!(subject = ?event.subject, before = ?event.before, after = ?event.after, "role changed");
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        self.update_gauges(&next);
        *latest = next;
    }

    fn update_gauges(&self, state: &RoleState) {
        if let Some(m) = &self.metrics {
            m.role_ledger_entries
                .set(self.store.len_of(&self.cfg.address) as i64);
            m.moderators.set(state.moderator_count() as i64);
        }
    }

    fn is_genesis(&self, issuer: &Identity, record: &RoleRecord) -> bool {
        issuer.device_id == self.cfg.creator
            && matches!(
                record,
                RoleRecord {
                    target: GrantTarget::Account(_),
                    change: RoleChange::Grant(Role::Moderator),
                }
            )
    }

    fn materialize(&self, point: &CausalPoint) -> Replay {
        let mut run = Replay::default();
        self.replay(&mut run, &self.store.linearize(point));
        run
    }

    fn replay(&self, run: &mut Replay, entries: &[Arc<LogEntry>]) {
        for entry in entries {
            let past = run.admit(entry, self.identity.log());
            if entry.log != self.cfg.address {
                continue;
            }
            let outcome = self.judge(run, entry, &past);
            trace!(hash = %entry.hash, ?outcome, "role entry");
            run.roles.record(entry.hash, outcome);
        }
    }

    fn judge(&self, run: &mut Replay, entry: &LogEntry, past: &BTreeSet<EntryHash>) -> GrantOutcome {
        let Some(issuer) = entry.identity else {
            return GrantOutcome::Malformed;
        };
        let record = match (entry.operation.as_str(), entry.decode_payload::<RoleRecord>()) {
            (OP_ROLE, Ok(record)) => record,
            _ => return GrantOutcome::Malformed,
        };
        if !self.gate.permits(&issuer.device_id) {
            return GrantOutcome::NotInAllowList;
        }

        if entry.is_root() {
            if !run.genesis_seen && self.is_genesis(&issuer, &record) {
                run.genesis_seen = true;
                run.roles.apply(&record);
                return GrantOutcome::Genesis;
            }
            return GrantOutcome::NotGenesis;
        }

        let Some(account) = run.account_at(&issuer.device_id, past) else {
            return GrantOutcome::UnresolvedIssuer;
        };
        let state = &mut run.roles;
        if state.effective_role(&account, &issuer.device_id) != Some(Role::Moderator) {
            return GrantOutcome::Unauthorized;
        }

        let previous = state.apply(&record);
        if state.moderator_count() == 0 {
            state.restore(&record.target, previous);
            return GrantOutcome::WouldOrphanModerators;
        }
        GrantOutcome::Applied
    }

    /// Parentless genesis entry making `account` the first moderator.
    pub fn genesis_entry<B: SignerBackend + ?Sized>(
        &self,
        creator: &B,
        account: AccountId,
    ) -> Result<LogEntry, EntryError> {
        info!(ledger = %self.cfg.address, %account, "creating role ledger genesis");
        self.record_entry_at(
            creator,
            &RoleRecord::grant(account, Role::Moderator),
            &CausalPoint::empty(),
        )
    }

    /// Role entry authored on top of everything currently stored.
    pub fn record_entry<B: SignerBackend + ?Sized>(
        &self,
        signer: &B,
        record: &RoleRecord,
    ) -> Result<LogEntry, EntryError> {
        self.record_entry_at(signer, record, &self.store.heads())
    }

    /// Role entry authored at `point`.
    pub fn record_entry_at<B: SignerBackend + ?Sized>(
        &self,
        signer: &B,
        record: &RoleRecord,
        point: &CausalPoint,
    ) -> Result<LogEntry, EntryError> {
        LogEntry::new_record(
            self.cfg.address.clone(),
            OperationKind::from(OP_ROLE),
            record,
            point.heads().iter().copied(),
            signer,
        )
    }
}

fn role_events(before: &RoleState, after: &RoleState) -> Vec<RoleEvent> {
    fn diff<K: Ord + Clone>(
        a: &BTreeMap<K, Role>,
        b: &BTreeMap<K, Role>,
        wrap: impl Fn(K) -> GrantTarget,
        out: &mut Vec<RoleEvent>,
    ) {
        let keys: BTreeSet<&K> = a.keys().chain(b.keys()).collect();
        for k in keys {
            let (was, now) = (a.get(k).copied(), b.get(k).copied());
            if was != now {
                out.push(RoleEvent {
                    subject: wrap(k.clone()),
                    before: was,
                    after: now,
                });
            }
        }
    }

    let mut out = Vec::new();
    diff(before.accounts(), after.accounts(), GrantTarget::Account, &mut out);
    diff(before.devices(), after.devices(), GrantTarget::Device, &mut out);
    out
}
