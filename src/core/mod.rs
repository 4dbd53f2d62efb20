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

/// Node configuration.
pub mod config;
/// Signed entries and the causal store.
pub mod log;
/// Device keys.
pub mod security;
/// Persistence and Merkle digests.
pub mod state;
/// Identifiers, roles and canonical encoding.
pub mod types;
