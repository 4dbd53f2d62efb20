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

//! Access control: identity resolution, allow-lists, the role ledger and role-aware controllers.

pub mod address;
pub mod base_list;
pub mod controller;
pub mod identity;
pub mod registry;
pub mod role_aware;
pub mod role_digest;
pub mod role_ledger;
pub mod role_state;
pub mod writer_list;
