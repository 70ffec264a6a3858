// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Inbound handling for a `keyreset` command list. Unlike the managed-group
//! handlers, a key-reset command list is applied all-or-nothing: validating
//! every command comes first, store/Crypto Provider writes only happen once
//! every command in the list has passed.

use trustcore_common::codec::wire::KeyResetCommandList;
use trustcore_common::crypto::{CryptoProvider, KeyMaterial};
use trustcore_common::identifiers::{CommType, Fingerprint, Identity, TrustLevel};
use trustcore_common::transport::{PeerEvaluator, Transport};
use tracing::{info, warn};

use crate::Outcome;
use crate::store::{IdentityKey, Store};

use super::{KeyResetEngine, KeyResetError, KeyResetResult};

struct ValidatedCommand {
    identity: IdentityKey,
    old_fpr: Fingerprint,
    new_fpr: Fingerprint,
}

impl<S, C, T, P> KeyResetEngine<S, C, T, P>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    /// `sender` is the identity the envelope's `from` address resolved to;
    /// `key_materials` carries one attachment per entry in
    /// `command_list.commands`, in order — the new key each command names
    /// must already be importable from it, or the command is malformed.
    pub async fn receive_key_reset(
        &self,
        signer_fpr: &Fingerprint,
        sender: &IdentityKey,
        command_list: &KeyResetCommandList,
        key_materials: &[KeyMaterial],
    ) -> KeyResetResult<Outcome> {
        if self.crypto.is_revoked(signer_fpr)? {
            warn!(%signer_fpr, "rejecting keyreset signed by a revoked key");
            return Err(KeyResetError::SignerRevoked);
        }
        if self.crypto.is_mistrusted(signer_fpr)? {
            warn!(%signer_fpr, "rejecting keyreset signed by a mistrusted key");
            return Err(KeyResetError::SignerMistrusted);
        }

        let own_user_id = self.store.default_own_user_id().await?;
        let sender_is_own = own_user_id == Some(sender.0);

        if sender_is_own {
            let trust = self.store.get_trust(sender.0, signer_fpr).await?;
            if !trust.is_some_and(|t| t.comm_type >= CommType::Pep) {
                return Err(KeyResetError::SignerNotTrusted);
            }
        }

        if command_list.commands.len() != key_materials.len() {
            return Err(KeyResetError::Malformed);
        }

        let mut validated = Vec::with_capacity(command_list.commands.len());
        for (command, material) in command_list.commands.iter().zip(key_materials) {
            let old_fpr = command
                .identity
                .fingerprint
                .as_deref()
                .map(Fingerprint::new)
                .ok_or(KeyResetError::Malformed)?;
            if command.new_fpr.is_empty() {
                return Err(KeyResetError::Malformed);
            }
            let new_fpr_str =
                String::from_utf8(command.new_fpr.clone()).map_err(|_| KeyResetError::Malformed)?;
            let new_fpr = Fingerprint::new(new_fpr_str);
            let identity: IdentityKey = (command.identity.user_id, command.identity.address.clone());

            if sender_is_own && self.crypto.has_private_key(&old_fpr)? && self.crypto.is_revoked(&old_fpr)? {
                continue; // idempotent replay of an own reset we already applied
            }

            self.crypto.import_key_material(&new_fpr, material)?;
            if self.crypto.is_revoked(&new_fpr)? {
                return Err(KeyResetError::NewKeyRevoked);
            }

            if self.store.get_identity(&identity).await?.is_none() {
                let mut tx = self.store.begin().await?;
                self.store
                    .upsert_identity(&mut tx, Identity::new(identity.0, identity.1.clone()))
                    .await?;
                self.store.commit(tx).await?;
            }

            if self.store.get_trust(identity.0, &old_fpr).await?.is_none() {
                return Err(KeyResetError::UnknownOldKey);
            }

            if !sender_is_own && !self.crypto.is_revoked(&old_fpr)? {
                return Err(KeyResetError::PeerOldKeyNotRevoked);
            }

            validated.push(ValidatedCommand {
                identity,
                old_fpr,
                new_fpr,
            });
        }

        if validated.is_empty() {
            info!(sender = ?sender, "ignoring keyreset command list with nothing left to apply");
            return Ok(Outcome::Ignored);
        }

        let mut tx = self.store.begin().await?;
        for command in &validated {
            self.store
                .set_identity_default_key(&mut tx, &command.identity, Some(command.new_fpr.clone()))
                .await?;
            let raw = self.crypto.raw_rating(&command.new_fpr)?;
            let comm_type = if raw == CommType::Pep { CommType::PepUnconfirmed } else { raw };
            self.store
                .set_trust(&mut tx, command.identity.0, &command.new_fpr, TrustLevel::new(comm_type))
                .await?;
            self.store
                .set_replacement(&mut tx, &command.old_fpr, &command.new_fpr, chrono::Utc::now())
                .await?;
        }
        self.store.commit(tx).await?;

        for command in &validated {
            if sender_is_own {
                if !self.crypto.is_revoked(&command.old_fpr)? {
                    self.crypto.revoke_key(&command.old_fpr)?;
                }
            } else {
                self.crypto.delete_key(&command.old_fpr)?;
            }
        }

        info!(sender = ?sender, applied = validated.len(), "applied inbound keyreset command list");
        Ok(Outcome::Processed)
    }
}
