// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The key-reset protocol: replacing a compromised or expiring key (own or
//! peer), propagating the replacement to anyone who needs to know, and
//! keeping trust correct across the change.

pub mod error;
mod grouped;
mod notify;
pub mod receive;
mod single;

#[cfg(test)]
mod tests;

pub use error::KeyResetError;

use tracing::debug;
use trustcore_common::crypto::CryptoProvider;
use trustcore_common::identifiers::{Fingerprint, Identity, UserId};
use trustcore_common::transport::{PeerEvaluator, Transport};

use crate::store::{IdentityKey, Store, StoreError};

pub type KeyResetResult<T> = Result<T, KeyResetError>;

/// The identity half of `key_reset`'s `(F, I)` argument pair, when a
/// fingerprint alone isn't enough to say what's being reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetIdentity {
    /// Own identity named by user only — reset every key associated with
    /// this user, one at a time.
    User(UserId),
    /// A specific `(user_id, address)` row — resolve its current default
    /// key before resetting.
    Keyed(IdentityKey),
}

pub(crate) fn identity_wire_with_fpr(
    identity: &Identity,
    fpr: &Fingerprint,
) -> trustcore_common::codec::wire::WireIdentity {
    trustcore_common::codec::wire::WireIdentity {
        fingerprint: Some(fpr.as_str().to_string()),
        ..crate::groups::wire_identity(identity)
    }
}

/// Owns the same four collaborators as [`crate::groups::GroupEngine`]; kept
/// as a distinct type rather than folded into it because the two protocols
/// share no state machine, only the trust store underneath.
pub struct KeyResetEngine<S, C, T, P> {
    store: S,
    crypto: C,
    transport: T,
    #[allow(dead_code, reason = "kept symmetric with GroupEngine's collaborator set; key-reset's own inbound validation has no rating gate to apply")]
    peers: P,
}

impl<S, C, T, P> KeyResetEngine<S, C, T, P>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    pub fn new(store: S, crypto: C, transport: T, peers: P) -> Self {
        Self {
            store,
            crypto,
            transport,
            peers,
        }
    }

    /// Reset every own key on this device, one at a time.
    pub async fn key_reset_all_own_keys(&self) -> KeyResetResult<()> {
        let user_id = self
            .store
            .default_own_user_id()
            .await?
            .ok_or(StoreError::NoDefaultOwnIdentity)?;
        for key in self.store.identity_keys_for_user(user_id).await? {
            self.reset_fingerprint(&key).await?;
        }
        Ok(())
    }

    /// The five mutually-exclusive regimes of `key_reset(F?, I?)`: resolve
    /// down to a concrete fingerprint, then dispatch grouped vs. single vs.
    /// peer reset based on what the store and Crypto Provider say about it.
    pub async fn key_reset(
        &self,
        fpr: Option<&Fingerprint>,
        identity: Option<ResetIdentity>,
    ) -> KeyResetResult<()> {
        match (fpr, identity) {
            (None, None) => self.key_reset_all_own_keys().await,
            (None, Some(ResetIdentity::User(user_id))) => {
                for key in self.store.identity_keys_for_user(user_id).await? {
                    self.reset_fingerprint(&key).await?;
                }
                Ok(())
            }
            (None, Some(ResetIdentity::Keyed(key))) => {
                let resolved = match self.store.identity_default_key(&key).await? {
                    Some(fpr) => Some(fpr),
                    None => self.store.user_default_key(key.0).await?,
                };
                match resolved {
                    Some(fpr) => self.reset_fingerprint(&fpr).await,
                    None => Ok(()),
                }
            }
            (Some(fpr), _) => self.reset_fingerprint(fpr).await,
        }
    }

    /// Regimes 4 and 5: given a concrete fingerprint, gather every identity
    /// currently defaulting to it and reset accordingly — grouped own reset
    /// if any of them is device-grouped, otherwise a single reset per own
    /// identity, otherwise a single reset per peer identity.
    async fn reset_fingerprint(&self, fpr: &Fingerprint) -> KeyResetResult<()> {
        let identities = self.store.identities_with_default_key(fpr).await?;
        let (own, peer): (Vec<Identity>, Vec<Identity>) =
            identities.into_iter().partition(|identity| identity.own());

        if !own.is_empty() {
            if !self.crypto.has_private_key(fpr)? {
                return Err(KeyResetError::KeyNotOwned);
            }
            if own.iter().any(|identity| identity.capabilities.device_group) {
                debug!(%fpr, count = own.len(), "resetting a device-grouped own key");
                return grouped::grouped_own_reset(self, fpr, own).await;
            }
            debug!(%fpr, count = own.len(), "resetting own key(s)");
            for identity in &own {
                single::single_own_reset(self, fpr, identity).await?;
            }
            return Ok(());
        }

        debug!(%fpr, count = peer.len(), "resetting peer key(s)");
        for identity in &peer {
            single::single_peer_reset(self, fpr, identity).await?;
        }
        Ok(())
    }
}
