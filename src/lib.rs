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

//! Rolegate - role-based access control for append-only, causally replicated logs.
//!
//! This repository provides:
//! - Signed, content-addressed log entries and a causal store with deterministic linearization
//! - Signer → account resolution from signed device-linking records
//! - Allow-list and role-aware append controllers behind one closed controller type
//! - A replicated role ledger whose grants are themselves access controlled
//! - An explicit controller registry, Prometheus metrics and structured logging

/// Access controllers, identity resolution and the role ledger.
pub mod access;
/// Core primitives (types, entries, store, persistence, keys, config).
pub mod core;
/// Observability (metrics).
pub mod monitoring;
