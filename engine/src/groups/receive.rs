// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Inbound handling for `groupCreate`, `groupAdopted` and `groupDissolve`.
//! Every handler checks the envelope's signer against the identity it
//! claims to speak for before touching the store — see
//! [`super::verify_signer`].

use trustcore_common::crypto::{CryptoProvider, KeyMaterial};
use trustcore_common::identifiers::{Address, Fingerprint, Rating};
use trustcore_common::transport::{PeerEvaluator, Transport};
use trustcore_common::codec::wire::{GroupAdopted, GroupCreate, GroupDissolve};

use tracing::{debug, info, warn};

use crate::Outcome;
use crate::store::{IdentityKey, Store};

use super::{GroupEngine, GroupError, GroupResult, identity_from_wire, verify_signer};

impl<S, C, T, P> GroupEngine<S, C, T, P>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    /// A manager invited this device into a group. `key_material` is the
    /// group private key, delivered as an out-of-band attachment rather
    /// than inside the wire payload; pass `None` if the transport hasn't
    /// surfaced it yet (the adoption then stays pending the key arriving).
    /// Rejects the envelope outright if `rating` is below
    /// [`Rating::MINIMUM_FOR_DISTRIBUTION`].
    pub async fn receive_group_create(
        &self,
        signer_fpr: &Fingerprint,
        command: &GroupCreate,
        key_material: Option<&KeyMaterial>,
        rating: Rating,
        own_address: &Address,
    ) -> GroupResult<Outcome> {
        if !rating.meets(Rating::MINIMUM_FOR_DISTRIBUTION) {
            warn!(%rating, "rejecting groupCreate below the minimum distribution rating");
            return Err(GroupError::InsufficientRating);
        }

        let manager_key: IdentityKey = (command.manager.user_id, command.manager.address.clone());
        verify_signer(
            &self.store,
            &manager_key,
            command.manager.fingerprint.as_deref(),
            signer_fpr,
        )
        .await?;

        let group_key: IdentityKey = (
            command.group_identity.user_id,
            command.group_identity.address.clone(),
        );
        if self.store.exists_group(&group_key).await? {
            debug!(group = ?group_key, "ignoring groupCreate for an already-known group");
            return Ok(Outcome::Ignored);
        }

        let own_user_id = self
            .store
            .default_own_user_id()
            .await?
            .ok_or(crate::store::StoreError::NoDefaultOwnIdentity)?;

        let mut group_identity = identity_from_wire(&command.group_identity);
        group_identity.capabilities.group_identity = true;
        group_identity.capabilities.own = true;
        let manager_identity = identity_from_wire(&command.manager);
        let group_fpr = group_identity.fingerprint.clone();

        if let (Some(expected), Some(material)) = (&group_fpr, key_material) {
            self.crypto.import_key_material(expected, material)?;
        }

        let own_key: IdentityKey = (own_user_id, own_address.clone());

        let mut tx = self.store.begin().await?;
        self.store.upsert_identity(&mut tx, group_identity.clone()).await?;
        self.store.upsert_identity(&mut tx, manager_identity).await?;
        self.store
            .set_identity_default_key(&mut tx, &manager_key, command.manager.fingerprint.clone().map(Fingerprint::new))
            .await?;
        if let Some(group_fpr) = group_fpr {
            self.store
                .set_identity_default_key(&mut tx, &group_key, Some(group_fpr))
                .await?;
        }
        self.store.create_group(&mut tx, &group_key, &manager_key).await?;
        self.store
            .add_own_membership(&mut tx, &group_key, &own_key, &manager_key)
            .await?;
        self.store.commit(tx).await?;

        info!(group = ?group_key, manager = ?manager_key, "adopted group invite from manager");
        Ok(Outcome::Processed)
    }

    /// A member accepted the group — the manager marks it active. Rejects
    /// the envelope outright if `rating` is below
    /// [`Rating::MINIMUM_FOR_DISTRIBUTION`].
    pub async fn receive_group_adopted(
        &self,
        signer_fpr: &Fingerprint,
        command: &GroupAdopted,
        rating: Rating,
    ) -> GroupResult<Outcome> {
        if !rating.meets(Rating::MINIMUM_FOR_DISTRIBUTION) {
            warn!(%rating, "rejecting groupAdopted below the minimum distribution rating");
            return Err(GroupError::InsufficientRating);
        }

        let member_key: IdentityKey = (command.member.user_id, command.member.address.clone());
        verify_signer(
            &self.store,
            &member_key,
            command.member.fingerprint.as_deref(),
            signer_fpr,
        )
        .await?;

        let group_key: IdentityKey = (
            command.group_identity.user_id,
            command.group_identity.address.clone(),
        );
        if !self.store.is_invited_member(&group_key, &member_key).await? {
            debug!(group = ?group_key, member = ?member_key, "ignoring groupAdopted from a non-invited member");
            return Ok(Outcome::Ignored);
        }

        let mut tx = self.store.begin().await?;
        self.store
            .set_identity_default_key(
                &mut tx,
                &member_key,
                command.member.fingerprint.clone().map(Fingerprint::new),
            )
            .await?;
        self.store
            .set_member_joined(&mut tx, &group_key, &member_key, true)
            .await?;
        self.store.commit(tx).await?;

        info!(group = ?group_key, member = ?member_key, "marked member active after groupAdopted");
        Ok(Outcome::Processed)
    }

    /// The manager dissolved the group — disable it locally. Rejects a
    /// forged dissolve from anyone but the recorded manager, and rejects
    /// the envelope outright if `rating` is below
    /// [`Rating::MINIMUM_FOR_DISTRIBUTION`].
    pub async fn receive_group_dissolve(
        &self,
        signer_fpr: &Fingerprint,
        command: &GroupDissolve,
        rating: Rating,
    ) -> GroupResult<Outcome> {
        if !rating.meets(Rating::MINIMUM_FOR_DISTRIBUTION) {
            warn!(%rating, "rejecting groupDissolve below the minimum distribution rating");
            return Err(GroupError::InsufficientRating);
        }

        let group_key: IdentityKey = (
            command.group_identity.user_id,
            command.group_identity.address.clone(),
        );
        if !self.store.exists_group(&group_key).await? {
            return Ok(Outcome::Ignored);
        }

        let manager_key: IdentityKey = (command.manager.user_id, command.manager.address.clone());
        let recorded_manager = self.store.get_group_manager(&group_key).await?;
        if recorded_manager != manager_key {
            warn!(group = ?group_key, claimed = ?manager_key, recorded = ?recorded_manager, "rejecting groupDissolve from a non-manager");
            return Err(GroupError::SignerIdentityMismatch);
        }
        verify_signer(
            &self.store,
            &manager_key,
            command.manager.fingerprint.as_deref(),
            signer_fpr,
        )
        .await?;

        if !self.store.is_group_active(&group_key).await? {
            return Ok(Outcome::Ignored);
        }

        let mut tx = self.store.begin().await?;
        self.store.disable_group(&mut tx, &group_key).await?;
        self.store.commit(tx).await?;

        info!(group = ?group_key, "disabled group after groupDissolve");
        Ok(Outcome::Processed)
    }
}
