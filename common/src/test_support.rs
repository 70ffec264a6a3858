// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory mocks of the external collaborators, feature-gated behind
//! `test_utils` and used only from `dev-dependencies` of downstream crates.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::crypto::{CryptoError, CryptoProvider, KeyMaterial};
use crate::identifiers::{CommType, Fingerprint, Identity, Rating, UserId};
use crate::transport::{OutboundMessage, PeerEvaluator, Transport, TransportError};

/// A keyring that exists only in process memory, standing in for a real
/// GnuPG/Sequoia-backed [`CryptoProvider`]. Cheaply `Clone`: every clone
/// shares the same keyring, so a test can keep a handle for assertions
/// while also handing an owned copy to an engine.
#[derive(Default, Clone)]
pub struct MockCryptoProvider {
    inner: Arc<Mutex<MockCryptoState>>,
}

#[derive(Default)]
struct MockCryptoState {
    private_keys: HashSet<Fingerprint>,
    revoked: HashSet<Fingerprint>,
    mistrusted: HashSet<Fingerprint>,
    next_serial: u64,
}

impl MockCryptoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a keypair as if it had been generated earlier, returning its
    /// fingerprint. Used by tests to set up pre-existing own/peer keys.
    pub fn seed_keypair(&self, owned: bool) -> Fingerprint {
        let mut state = self.inner.lock().unwrap();
        state.next_serial += 1;
        let fpr = Fingerprint::new(format!("{:016x}", state.next_serial));
        if owned {
            state.private_keys.insert(fpr.clone());
        }
        fpr
    }
}

impl CryptoProvider for MockCryptoProvider {
    fn has_private_key(&self, fpr: &Fingerprint) -> Result<bool, CryptoError> {
        Ok(self.inner.lock().unwrap().private_keys.contains(fpr))
    }

    fn generate_keypair(&self, _user_id: &UserId) -> Result<Fingerprint, CryptoError> {
        Ok(self.seed_keypair(true))
    }

    fn revoke_key(&self, fpr: &Fingerprint) -> Result<(), CryptoError> {
        self.inner.lock().unwrap().revoked.insert(fpr.clone());
        Ok(())
    }

    fn is_revoked(&self, fpr: &Fingerprint) -> Result<bool, CryptoError> {
        Ok(self.inner.lock().unwrap().revoked.contains(fpr))
    }

    fn mark_mistrusted(&self, fpr: &Fingerprint) -> Result<(), CryptoError> {
        self.inner.lock().unwrap().mistrusted.insert(fpr.clone());
        Ok(())
    }

    fn is_mistrusted(&self, fpr: &Fingerprint) -> Result<bool, CryptoError> {
        Ok(self.inner.lock().unwrap().mistrusted.contains(fpr))
    }

    fn clear_mistrusted(&self, fpr: &Fingerprint) -> Result<(), CryptoError> {
        self.inner.lock().unwrap().mistrusted.remove(fpr);
        Ok(())
    }

    fn import_key_material(
        &self,
        expected: &Fingerprint,
        material: &KeyMaterial,
    ) -> Result<(), CryptoError> {
        if material.as_bytes().is_empty() {
            return Err(CryptoError::ImportFailed);
        }
        let mut state = self.inner.lock().unwrap();
        // The mock encodes "this export carried the private half" as the
        // material starting with a single 0x01 byte (see export_key_material).
        if material.as_bytes().first() == Some(&1) {
            state.private_keys.insert(expected.clone());
        }
        Ok(())
    }

    fn export_public_key_material(&self, fpr: &Fingerprint) -> Result<KeyMaterial, CryptoError> {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(fpr.as_str().as_bytes());
        Ok(KeyMaterial::from_bytes(bytes))
    }

    fn export_key_material(&self, fpr: &Fingerprint) -> Result<KeyMaterial, CryptoError> {
        if !self.has_private_key(fpr)? {
            return Err(CryptoError::KeyUnsuitable);
        }
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(fpr.as_str().as_bytes());
        Ok(KeyMaterial::from_bytes(bytes))
    }

    fn delete_key(&self, fpr: &Fingerprint) -> Result<(), CryptoError> {
        self.inner.lock().unwrap().private_keys.remove(fpr);
        Ok(())
    }

    fn raw_rating(&self, _fpr: &Fingerprint) -> Result<CommType, CryptoError> {
        Ok(CommType::PepUnconfirmed)
    }
}

/// Captures every message handed to [`Transport::send`] for test assertions
/// instead of actually delivering it. Cheaply `Clone`, for the same reason
/// as [`MockCryptoProvider`].
#[derive(Default, Clone)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    registered: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            registered: true,
        }
    }

    pub fn unregistered() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            registered: false,
        }
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        if !self.registered {
            return Err(TransportError::NotRegistered);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// A fixed rating table, defaulting every unlisted identity to `Reliable`.
#[derive(Default, Clone)]
pub struct MockPeerEvaluator {
    overrides: HashMap<UserId, Rating>,
}

impl MockPeerEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rating(&mut self, user_id: UserId, rating: Rating) {
        self.overrides.insert(user_id, rating);
    }
}

impl PeerEvaluator for MockPeerEvaluator {
    fn rating(&self, identity: &Identity) -> Rating {
        self.overrides
            .get(&identity.user_id)
            .copied()
            .unwrap_or(Rating::Reliable)
    }
}
