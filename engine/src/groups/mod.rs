// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The managed-group protocol: a manager identity creates a shared group
//! identity, invites members to adopt its key, and can dissolve the group
//! later. Every wire-visible step is mirrored by a local counterpart the
//! manager or member calls directly.

pub mod error;
pub mod receive;


pub use error::GroupError;

use trustcore_common::codec::Distribution;
use trustcore_common::codec::wire::{self, ManagedGroupCommand};
use trustcore_common::crypto::CryptoProvider;
use trustcore_common::identifiers::{Identity, Rating};
use trustcore_common::transport::{PeerEvaluator, Transport};
use tracing::{debug, info, warn};

use crate::outbound::send_distribution;
use crate::store::{IdentityKey, Store};

pub type GroupResult<T> = Result<T, GroupError>;

/// Resolve whether `signer_fpr` may legitimately speak for `claimed`.
///
/// If the store already has a default key on file for `claimed`, the
/// signer must match *that* — the stored key is the cryptographic source
/// of truth, never the payload's self-description. Only on first contact,
/// when no key is on file yet, does the payload's claimed fingerprint get
/// to establish one, and even then only if it's the fingerprint that
/// actually signed the envelope.
pub(crate) async fn verify_signer<S: Store>(
    store: &S,
    claimed: &IdentityKey,
    claimed_fpr_hex: Option<&str>,
    signer_fpr: &trustcore_common::identifiers::Fingerprint,
) -> GroupResult<()> {
    match store.identity_default_key(claimed).await? {
        Some(known_fpr) => {
            if &known_fpr == signer_fpr {
                Ok(())
            } else {
                warn!(?claimed, %signer_fpr, "signer does not match the stored default key");
                Err(GroupError::SignerIdentityMismatch)
            }
        }
        None => {
            if claimed_fpr_hex.map(|hex| hex.eq_ignore_ascii_case(signer_fpr.as_str())) == Some(true) {
                Ok(())
            } else {
                warn!(?claimed, %signer_fpr, "signer does not match the claimed fingerprint on first contact");
                Err(GroupError::SignerIdentityMismatch)
            }
        }
    }
}

pub(crate) fn wire_identity(identity: &Identity) -> wire::WireIdentity {
    wire::WireIdentity {
        user_id: identity.user_id,
        address: identity.address.clone(),
        fingerprint: identity.fingerprint.as_ref().map(|f| f.as_str().to_string()),
        display_name: identity.display_name.clone(),
    }
}

pub(crate) fn identity_from_wire(wire: &wire::WireIdentity) -> Identity {
    let mut identity = Identity::new(wire.user_id, wire.address.clone());
    identity.display_name = wire.display_name.clone();
    if let Some(fpr) = &wire.fingerprint {
        identity.fingerprint = Some(trustcore_common::identifiers::Fingerprint::new(fpr.clone()));
    }
    identity
}

/// Owns the collaborators the managed-group protocol needs: the trust
/// store, the crypto backend, the outbound transport and the peer rating
/// source. Every method is a unit of work the caller drives explicitly —
/// nothing here spawns background tasks or holds a long-lived lock.
pub struct GroupEngine<S, C, T, P> {
    store: S,
    crypto: C,
    transport: T,
    peers: P,
}

impl<S, C, T, P> GroupEngine<S, C, T, P>
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

    /// The manager creates a fresh group identity, generates its keypair,
    /// registers itself as the sole active member, and inserts one invited
    /// member row per entry in `members`. If `manager` is own, every member
    /// whose rating is at least [`Rating::MINIMUM_FOR_DISTRIBUTION`] is
    /// immediately sent a `groupCreate` command carrying the group's
    /// private key as an attachment.
    pub async fn create_group(
        &self,
        mut group_identity: Identity,
        manager: Identity,
        members: Vec<Identity>,
    ) -> GroupResult<Identity> {
        let group_fpr = self.crypto.generate_keypair(&group_identity.user_id)?;
        group_identity.capabilities.group_identity = true;
        let group_identity = group_identity.with_fingerprint(group_fpr.clone());

        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        let manager_key: IdentityKey = (manager.user_id, manager.address.clone());

        let mut tx = self.store.begin().await?;
        self.store.upsert_identity(&mut tx, group_identity.clone()).await?;
        self.store.upsert_identity(&mut tx, manager.clone()).await?;
        self.store
            .set_identity_default_key(&mut tx, &group_key, Some(group_fpr.clone()))
            .await?;
        self.store.create_group(&mut tx, &group_key, &manager_key).await?;
        self.store.add_member(&mut tx, &group_key, &manager_key).await?;
        self.store
            .set_member_joined(&mut tx, &group_key, &manager_key, true)
            .await?;
        self.store
            .add_own_membership(&mut tx, &group_key, &manager_key, &manager_key)
            .await?;
        self.store
            .set_own_membership_joined(&mut tx, &group_key, &manager_key)
            .await?;
        for member in &members {
            let member_key: IdentityKey = (member.user_id, member.address.clone());
            self.store.upsert_identity(&mut tx, member.clone()).await?;
            self.store.add_member(&mut tx, &group_key, &member_key).await?;
        }
        self.store.commit(tx).await?;

        info!(group = ?group_key, manager = ?manager_key, members = members.len(), "created managed group");

        if manager.own() {
            let command = Distribution::ManagedGroup(ManagedGroupCommand::GroupCreate(wire::GroupCreate {
                group_identity: wire_identity(&group_identity),
                manager: wire_identity(&manager),
            }));
            for member in &members {
                if !self.peers.rating(member).meets(Rating::MINIMUM_FOR_DISTRIBUTION) {
                    debug!(member = ?member.user_id, "skipping initial groupCreate dispatch, rating below reliable");
                    continue;
                }
                let key_material = self.crypto.export_key_material(&group_fpr)?;
                send_distribution(&self.transport, &manager.address, &member.address, &command, vec![key_material])?;
            }
        }
        Ok(group_identity)
    }

    /// The manager invites `member` to adopt the group identity. If
    /// `member`'s rating is at least [`Rating::MINIMUM_FOR_DISTRIBUTION`],
    /// the invite carries the group's exported key material as the
    /// attachment the wire payload itself never carries; otherwise the
    /// invited-member row is still recorded, but no private key material is
    /// handed out.
    pub async fn group_invite_member(
        &self,
        group_identity: &Identity,
        manager: &Identity,
        member: &Identity,
    ) -> GroupResult<()> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        if !self.store.is_group_active(&group_key).await? {
            return Err(GroupError::GroupDisabled);
        }

        let group_fpr = group_identity
            .fingerprint
            .clone()
            .ok_or(GroupError::NoPrivateKeyForGroup)?;
        if !self.crypto.has_private_key(&group_fpr)? {
            return Err(GroupError::NoPrivateKeyForGroup);
        }

        let member_key: IdentityKey = (member.user_id, member.address.clone());
        if self.store.is_active_member(&group_key, &member_key).await? {
            return Err(GroupError::AlreadyActiveMember);
        }

        let mut tx = self.store.begin().await?;
        self.store.upsert_identity(&mut tx, member.clone()).await?;
        self.store.add_member(&mut tx, &group_key, &member_key).await?;
        self.store.commit(tx).await?;

        if !self.peers.rating(member).meets(Rating::MINIMUM_FOR_DISTRIBUTION) {
            debug!(group = ?group_key, member = ?member_key, "invited member recorded, skipping dispatch: rating below reliable");
            return Ok(());
        }

        let command = Distribution::ManagedGroup(ManagedGroupCommand::GroupCreate(wire::GroupCreate {
            group_identity: wire_identity(group_identity),
            manager: wire_identity(manager),
        }));
        let key_material = self.crypto.export_key_material(&group_fpr)?;
        send_distribution(&self.transport, &manager.address, &member.address, &command, vec![key_material])?;
        debug!(group = ?group_key, member = ?member_key, "invited member to managed group");
        Ok(())
    }

    /// Enables a previously-disabled group identity.
    pub async fn group_enable(&self, group_identity: &Identity) -> GroupResult<()> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        let mut tx = self.store.begin().await?;
        self.store.enable_group(&mut tx, &group_key).await?;
        self.store.commit(tx).await?;
        Ok(())
    }

    /// Disables a group identity without dissolving it: no `groupDissolve`
    /// is sent, unlike [`GroupEngine::group_dissolve`].
    pub async fn group_disable(&self, group_identity: &Identity) -> GroupResult<()> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        let mut tx = self.store.begin().await?;
        self.store.disable_group(&mut tx, &group_key).await?;
        self.store.commit(tx).await?;
        Ok(())
    }

    /// The manager removes a member locally. No wire message is sent — a
    /// removed member simply stops being counted towards active
    /// membership and [`GroupEngine::group_rating`].
    pub async fn group_remove_member(
        &self,
        group_identity: &Identity,
        member: &Identity,
    ) -> GroupResult<()> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        let member_key: IdentityKey = (member.user_id, member.address.clone());
        let mut tx = self.store.begin().await?;
        self.store.remove_member(&mut tx, &group_key, &member_key).await?;
        self.store.commit(tx).await?;
        Ok(())
    }

    /// A device that received a `groupCreate` it wants to accept calls
    /// this to mark its own membership joined and reply with a
    /// `groupAdopted` so the manager can count it as active.
    pub async fn group_join(
        &self,
        group_identity: &Identity,
        own_identity: &Identity,
        manager: &Identity,
    ) -> GroupResult<()> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        let own_key: IdentityKey = (own_identity.user_id, own_identity.address.clone());

        let mut tx = self.store.begin().await?;
        self.store
            .set_own_membership_joined(&mut tx, &group_key, &own_key)
            .await?;
        self.store.commit(tx).await?;

        let command = Distribution::ManagedGroup(ManagedGroupCommand::GroupAdopted(wire::GroupAdopted {
            group_identity: wire_identity(group_identity),
            member: wire_identity(own_identity),
        }));
        send_distribution(&self.transport, &own_identity.address, &manager.address, &command, vec![])?;
        debug!(group = ?group_key, member = ?own_key, "joined managed group, notifying manager");
        Ok(())
    }

    /// This device leaves a group it had joined. Purely local: no wire
    /// message is sent, matching the documented behaviour that a quiet
    /// departure does not need to be announced.
    pub async fn leave_group(&self, group_identity: &Identity, own_identity: &Identity) -> GroupResult<()> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        let own_key: IdentityKey = (own_identity.user_id, own_identity.address.clone());
        let mut tx = self.store.begin().await?;
        self.store
            .set_own_membership_left(&mut tx, &group_key, &own_key)
            .await?;
        self.store.commit(tx).await?;
        Ok(())
    }

    /// The manager ends the group: disables it locally and tells every
    /// currently active member. `group_disable` and this dissolve are the
    /// same single store transition — dissolving twice is a no-op, not a
    /// double-disable.
    pub async fn group_dissolve(&self, group_identity: &Identity, manager: &Identity) -> GroupResult<()> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        if !self.store.is_group_active(&group_key).await? {
            return Ok(());
        }

        let members = self.store.get_members(&group_key, true).await?;

        let mut tx = self.store.begin().await?;
        self.store.disable_group(&mut tx, &group_key).await?;
        self.store.commit(tx).await?;

        let command = Distribution::ManagedGroup(ManagedGroupCommand::GroupDissolve(wire::GroupDissolve {
            group_identity: wire_identity(group_identity),
            manager: wire_identity(manager),
        }));
        for member in members {
            let to = member.identity.1;
            send_distribution(&self.transport, &manager.address, &to, &command, vec![])?;
        }
        info!(group = ?group_key, "dissolved managed group");
        Ok(())
    }

    /// The minimum [`Rating`] across every active member, as judged by the
    /// Peer Evaluator. A group with no active members yet (just created,
    /// nobody has adopted) rates as fully anonymous rather than panicking
    /// on an empty minimum.
    pub async fn group_rating(&self, group_identity: &Identity) -> GroupResult<Rating> {
        let group_key: IdentityKey = (group_identity.user_id, group_identity.address.clone());
        let members = self.store.get_members(&group_key, true).await?;
        if members.is_empty() {
            return Ok(Rating::FullyAnonymous);
        }
        let mut worst = Rating::Trusted;
        for member in members {
            let identity = self
                .store
                .get_identity(&member.identity)
                .await?
                .unwrap_or_else(|| Identity::new(member.identity.0, member.identity.1.clone()));
            worst = worst.min(self.peers.rating(&identity));
        }
        Ok(worst)
    }
}
