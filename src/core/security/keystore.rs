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

//! Device keys: Ed25519 signing and verification for log entries.
//!
//! Key storage is left to the embedding application. This module only turns PKCS#8 documents
//! (or raw seeds, for tooling and tests) into a [`SignerBackend`] and verifies signatures against
//! raw public key bytes.

use ring::{
    rand::SystemRandom,
    signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519},
};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::core::types::{Identity, PublicKey, Signature};

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Key bytes could not be parsed.
    #[error("invalid key encoding")]
    InvalidKey,
    /// Random generation failed.
    #[error("crypto")]
    Crypto,
    /// Signature did not verify.
    #[error("bad signature")]
    BadSignature,
}

/// Signer backend abstraction (HSM compatible).
pub trait SignerBackend: Send + Sync {
    /// Return public key bytes (Ed25519, 32 bytes).
    fn public_key(&self) -> PublicKey;
    /// Sign message bytes.
    fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError>;

    /// Identity carried by entries this backend signs.
    fn identity(&self) -> Identity {
        Identity::of(self.public_key())
    }
}

/// In-memory Ed25519 device key.
pub struct DeviceKey {
    keypair: Ed25519KeyPair,
}

impl DeviceKey {
    /// Generate a fresh PKCS#8 document. The buffer is wiped on drop.
    pub fn generate_pkcs8() -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        let rng = SystemRandom::new();
        let doc = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeystoreError::Crypto)?;
        Ok(Zeroizing::new(doc.as_ref().to_vec()))
    }

    /// Generate a fresh key.
    pub fn generate() -> Result<Self, KeystoreError> {
        let pkcs8 = Self::generate_pkcs8()?;
        Self::from_pkcs8(&pkcs8)
    }

    /// Load from a PKCS#8 v2 document.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, KeystoreError> {
        let keypair = Ed25519KeyPair::from_pkcs8(pkcs8).map_err(|_| KeystoreError::InvalidKey)?;
        Ok(Self { keypair })
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Result<Self, KeystoreError> {
        let seed = Zeroizing::new(seed);
        let keypair =
            Ed25519KeyPair::from_seed_unchecked(&seed[..]).map_err(|_| KeystoreError::InvalidKey)?;
        Ok(Self { keypair })
    }
}

impl SignerBackend for DeviceKey {
    fn public_key(&self) -> PublicKey {
        let pk = self.keypair.public_key().as_ref();
        let mut out = [0u8; 32];
        out.copy_from_slice(pk);
        PublicKey(out)
    }

    fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError> {
        let sig = self.keypair.sign(msg);
        Ok(Signature(sig.as_ref().to_vec()))
    }
}

/// Verify signature given raw pubkey bytes.
pub fn verify_signature(pk: &PublicKey, msg: &[u8], sig: &Signature) -> Result<(), KeystoreError> {
    // ring requires signature length 64 for Ed25519
    if sig.0.len() != 64 {
        return Err(KeystoreError::BadSignature);
    }
    let pk = UnparsedPublicKey::new(&ED25519, &pk.0);
    pk.verify(msg, &sig.0).map_err(|_| KeystoreError::BadSignature)
}
