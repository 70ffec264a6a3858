// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The narrow contract this crate needs from a real public-key crypto
//! implementation (GnuPG, Sequoia, ...). Key generation, encrypt/decrypt/
//! sign/verify and certificate management live outside this core; what's
//! left here is the subset the Group Engine and Key-Reset Engine call
//! synchronously, since neither engine suspends mid-operation.

use secrecy::zeroize::{Zeroize, ZeroizeOnDrop};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifiers::{Fingerprint, UserId};

/// Exported key material, as attached to a `groupCreate` or `keyreset`
/// command. Redacted from `Debug`/`Display` and wiped on drop; variable
/// length since a key export is not a fixed number of bytes.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyMaterial(#[serde(with = "serde_key_material")] Vec<u8>);

mod serde_key_material {
    use serde::{Deserializer, Serializer, de::Deserialize};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(d)
    }
}

impl KeyMaterial {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial({} bytes, [[REDACTED]])", self.0.len())
    }
}

impl std::fmt::Display for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[[REDACTED]]")
    }
}

impl Zeroize for KeyMaterial {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl ZeroizeOnDrop for KeyMaterial {}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key found for this identity")]
    KeyNotFound,
    #[error("the key is not owned (no private half present)")]
    KeyUnsuitable,
    #[error("key material could not be imported")]
    ImportFailed,
    #[error("the crypto backend rejected the operation: {0}")]
    Backend(String),
}

/// The narrow synchronous contract the Group Engine and Key-Reset Engine
/// use. A real implementation wraps GnuPG/Sequoia/whatever; this crate
/// never looks inside a key.
pub trait CryptoProvider {
    /// Whether the private half of `fpr` is present (own keys only).
    fn has_private_key(&self, fpr: &Fingerprint) -> Result<bool, CryptoError>;

    /// Generate a fresh keypair for `user_id`, returning its fingerprint.
    fn generate_keypair(&self, user_id: &UserId) -> Result<Fingerprint, CryptoError>;

    /// Revoke `fpr`. Idempotent: revoking an already-revoked key succeeds.
    fn revoke_key(&self, fpr: &Fingerprint) -> Result<(), CryptoError>;

    fn is_revoked(&self, fpr: &Fingerprint) -> Result<bool, CryptoError>;

    /// Mark `fpr` as mistrusted. Suppresses it as a
    /// default for any identity until explicitly cleared.
    fn mark_mistrusted(&self, fpr: &Fingerprint) -> Result<(), CryptoError>;

    fn is_mistrusted(&self, fpr: &Fingerprint) -> Result<bool, CryptoError>;

    fn clear_mistrusted(&self, fpr: &Fingerprint) -> Result<(), CryptoError>;

    /// Import key material attached to an inbound command. Fails if the
    /// imported key's fingerprint does not match `expected`, or if the
    /// material does not yield a usable key at all.
    fn import_key_material(
        &self,
        expected: &Fingerprint,
        material: &KeyMaterial,
    ) -> Result<(), CryptoError>;

    /// Export the public half only (for standalone key-reset notifications).
    fn export_public_key_material(&self, fpr: &Fingerprint) -> Result<KeyMaterial, CryptoError>;

    /// Export public+private halves (for device-group fan-out and initial
    /// group-key distribution), where the caller already confirmed the
    /// private half exists via [`CryptoProvider::has_private_key`].
    fn export_key_material(&self, fpr: &Fingerprint) -> Result<KeyMaterial, CryptoError>;

    /// Delete a peer's public key entirely (single peer-key reset).
    fn delete_key(&self, fpr: &Fingerprint) -> Result<(), CryptoError>;

    /// The un-confirmed trust signal a freshly-seen key carries on its own,
    /// before any human action — never *confirmed*.
    fn raw_rating(&self, fpr: &Fingerprint) -> Result<crate::identifiers::CommType, CryptoError>;
}
