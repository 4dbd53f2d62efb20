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

//! Writes `<dir>/device.key` (Ed25519 PKCS#8) and prints `<public key hex> <device id hex>`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use rolegate::core::security::keystore::{DeviceKey, SignerBackend};

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let mut key_path = PathBuf::from(out_dir);
    std::fs::create_dir_all(&key_path)?;
    key_path.push("device.key");

    let pkcs8 = DeviceKey::generate_pkcs8().context("key generation failed")?;
    std::fs::write(&key_path, &pkcs8[..])?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600));
    }

    let key = DeviceKey::from_pkcs8(&pkcs8).context("reloading generated key")?;
    let identity = key.identity();
    println!("{} {}", identity.signer_key.to_hex(), identity.device_id.to_hex());
    Ok(())
}
