// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! An in-process [`Store`] with no backing file, for engine unit tests and
//! short-lived sessions that don't need durability.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use trustcore_common::identifiers::{Address, Fingerprint, Identity, TrustLevel, UserId};

use super::model::{IdentityKey, Member, OwnMembership, Replacement};
use super::{Store, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct GroupRow {
    manager: IdentityKey,
    active: bool,
}

#[derive(Default)]
struct Inner {
    identities: HashMap<IdentityKey, Identity>,
    default_own_user_id: Option<UserId>,
    identity_default_key: HashMap<IdentityKey, Fingerprint>,
    user_default_key: HashMap<UserId, Fingerprint>,
    trust: HashMap<(UserId, String), TrustLevel>,
    groups: HashMap<IdentityKey, GroupRow>,
    members: HashMap<IdentityKey, Vec<Member>>,
    own_memberships: HashMap<(IdentityKey, IdentityKey), OwnMembership>,
    notified_contacts: HashSet<(Address, Fingerprint, UserId)>,
    contacted_by: HashMap<Address, HashSet<UserId>>,
    recent_contacts: HashMap<Address, Vec<Identity>>,
    replacements: HashMap<Fingerprint, Replacement>,
}

/// An in-memory [`Store`]. Writes apply directly through the locked guard
/// handed out by [`Store::begin`]; dropping the guard without calling
/// [`Store::commit`] releases the lock without undoing anything already
/// written. Real rollback-on-drop is a SQLite-backend property
/// (`sqlx::Transaction`'s own `Drop`); this backend exists for fast,
/// ephemeral tests, not crash recovery.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a recently-contacted peer identity for `own_address`, used by
    /// tests exercising the recent-contact notification regime.
    pub async fn seed_recent_contact(&self, own_address: &Address, identity: Identity) {
        let mut inner = self.inner.lock().await;
        inner
            .recent_contacts
            .entry(own_address.clone())
            .or_default()
            .push(identity);
    }

    /// Record that `peer_user_id` has previously sent something to
    /// `own_address`, independent of recency.
    pub async fn seed_contacted_by(&self, own_address: &Address, peer_user_id: UserId) {
        let mut inner = self.inner.lock().await;
        inner
            .contacted_by
            .entry(own_address.clone())
            .or_default()
            .insert(peer_user_id);
    }
}

fn trust_key(user_id: UserId, fpr: &Fingerprint) -> (UserId, String) {
    (user_id, fpr.as_str().to_string())
}

impl Store for MemoryStore {
    type Tx = OwnedMutexGuard<Inner>;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        Ok(self.inner.clone().lock_owned().await)
    }

    async fn commit(&self, _tx: Self::Tx) -> StoreResult<()> {
        Ok(())
    }

    async fn get_identity(&self, key: &IdentityKey) -> StoreResult<Option<Identity>> {
        Ok(self.inner.lock().await.identities.get(key).cloned())
    }

    async fn upsert_identity(&self, tx: &mut Self::Tx, identity: Identity) -> StoreResult<()> {
        tx.identities
            .insert((identity.user_id, identity.address.clone()), identity);
        Ok(())
    }

    async fn identities_with_default_key(&self, fpr: &Fingerprint) -> StoreResult<Vec<Identity>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .identity_default_key
            .iter()
            .filter(|(_, current)| *current == fpr)
            .filter_map(|(key, _)| inner.identities.get(key).cloned())
            .collect())
    }

    async fn identity_keys_for_user(&self, user_id: UserId) -> StoreResult<Vec<Fingerprint>> {
        let inner = self.inner.lock().await;
        let mut keys: Vec<Fingerprint> = inner
            .identity_default_key
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .map(|(_, fpr)| fpr.clone())
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn default_own_user_id(&self) -> StoreResult<Option<UserId>> {
        Ok(self.inner.lock().await.default_own_user_id)
    }

    async fn set_default_own_user_id(&self, tx: &mut Self::Tx, user_id: UserId) -> StoreResult<()> {
        tx.default_own_user_id = Some(user_id);
        Ok(())
    }

    async fn identity_default_key(&self, key: &IdentityKey) -> StoreResult<Option<Fingerprint>> {
        Ok(self.inner.lock().await.identity_default_key.get(key).cloned())
    }

    async fn set_identity_default_key(
        &self,
        tx: &mut Self::Tx,
        key: &IdentityKey,
        fpr: Option<Fingerprint>,
    ) -> StoreResult<()> {
        match fpr {
            Some(fpr) => {
                tx.identity_default_key.insert(key.clone(), fpr);
            }
            None => {
                tx.identity_default_key.remove(key);
            }
        }
        Ok(())
    }

    async fn user_default_key(&self, user_id: UserId) -> StoreResult<Option<Fingerprint>> {
        Ok(self.inner.lock().await.user_default_key.get(&user_id).cloned())
    }

    async fn set_user_default_key(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        fpr: Option<Fingerprint>,
    ) -> StoreResult<()> {
        match fpr {
            Some(fpr) => {
                tx.user_default_key.insert(user_id, fpr);
            }
            None => {
                tx.user_default_key.remove(&user_id);
            }
        }
        Ok(())
    }

    async fn get_trust(&self, user_id: UserId, fpr: &Fingerprint) -> StoreResult<Option<TrustLevel>> {
        Ok(self.inner.lock().await.trust.get(&trust_key(user_id, fpr)).copied())
    }

    async fn set_trust(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        fpr: &Fingerprint,
        trust: TrustLevel,
    ) -> StoreResult<()> {
        tx.trust.insert(trust_key(user_id, fpr), trust);
        Ok(())
    }

    async fn clear_trust(&self, tx: &mut Self::Tx, user_id: UserId, fpr: &Fingerprint) -> StoreResult<()> {
        tx.trust.remove(&trust_key(user_id, fpr));
        Ok(())
    }

    async fn create_group(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        manager: &IdentityKey,
    ) -> StoreResult<()> {
        if tx.groups.contains_key(group_identity) {
            return Err(StoreError::GroupAlreadyExists(group_identity.0));
        }
        tx.groups.insert(
            group_identity.clone(),
            GroupRow {
                manager: manager.clone(),
                active: true,
            },
        );
        tx.members.entry(group_identity.clone()).or_default();
        Ok(())
    }

    async fn exists_group(&self, group_identity: &IdentityKey) -> StoreResult<bool> {
        Ok(self.inner.lock().await.groups.contains_key(group_identity))
    }

    async fn enable_group(&self, tx: &mut Self::Tx, group_identity: &IdentityKey) -> StoreResult<()> {
        tx.groups
            .get_mut(group_identity)
            .ok_or(StoreError::GroupNotFound)?
            .active = true;
        Ok(())
    }

    async fn disable_group(&self, tx: &mut Self::Tx, group_identity: &IdentityKey) -> StoreResult<()> {
        tx.groups
            .get_mut(group_identity)
            .ok_or(StoreError::GroupNotFound)?
            .active = false;
        Ok(())
    }

    async fn is_group_active(&self, group_identity: &IdentityKey) -> StoreResult<bool> {
        self.inner
            .lock()
            .await
            .groups
            .get(group_identity)
            .map(|row| row.active)
            .ok_or(StoreError::GroupNotFound)
    }

    async fn get_group_manager(&self, group_identity: &IdentityKey) -> StoreResult<IdentityKey> {
        self.inner
            .lock()
            .await
            .groups
            .get(group_identity)
            .map(|row| row.manager.clone())
            .ok_or(StoreError::GroupNotFound)
    }

    async fn add_member(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
    ) -> StoreResult<()> {
        let members = tx.members.entry(group_identity.clone()).or_default();
        if !members.iter().any(|m| &m.identity == member) {
            members.push(Member {
                identity: member.clone(),
                joined: false,
            });
        }
        Ok(())
    }

    async fn remove_member(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
    ) -> StoreResult<()> {
        if let Some(members) = tx.members.get_mut(group_identity) {
            members.retain(|m| &m.identity != member);
        }
        Ok(())
    }

    async fn set_member_joined(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
        joined: bool,
    ) -> StoreResult<()> {
        let members = tx.members.get_mut(group_identity).ok_or(StoreError::GroupNotFound)?;
        let row = members
            .iter_mut()
            .find(|m| &m.identity == member)
            .ok_or(StoreError::NotAMember)?;
        row.joined = joined;
        Ok(())
    }

    async fn get_members(
        &self,
        group_identity: &IdentityKey,
        only_active: bool,
    ) -> StoreResult<Vec<Member>> {
        let inner = self.inner.lock().await;
        let members = inner
            .members
            .get(group_identity)
            .cloned()
            .unwrap_or_default();
        Ok(if only_active {
            members.into_iter().filter(|m| m.joined).collect()
        } else {
            members
        })
    }

    async fn is_invited_member(
        &self,
        group_identity: &IdentityKey,
        identity: &IdentityKey,
    ) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .members
            .get(group_identity)
            .is_some_and(|members| members.iter().any(|m| &m.identity == identity)))
    }

    async fn is_active_member(
        &self,
        group_identity: &IdentityKey,
        identity: &IdentityKey,
    ) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.members.get(group_identity).is_some_and(|members| {
            members.iter().any(|m| &m.identity == identity && m.joined)
        }))
    }

    async fn add_own_membership(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
        manager: &IdentityKey,
    ) -> StoreResult<()> {
        tx.own_memberships.insert(
            (group_identity.clone(), own_identity.clone()),
            OwnMembership {
                own_identity: own_identity.clone(),
                manager: manager.clone(),
                joined: false,
            },
        );
        Ok(())
    }

    async fn set_own_membership_joined(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<()> {
        tx.own_memberships
            .get_mut(&(group_identity.clone(), own_identity.clone()))
            .ok_or(StoreError::OwnMembershipNotFound)?
            .joined = true;
        Ok(())
    }

    async fn set_own_membership_left(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<()> {
        tx.own_memberships
            .remove(&(group_identity.clone(), own_identity.clone()));
        Ok(())
    }

    async fn get_own_membership(
        &self,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<Option<OwnMembership>> {
        Ok(self
            .inner
            .lock()
            .await
            .own_memberships
            .get(&(group_identity.clone(), own_identity.clone()))
            .cloned())
    }

    async fn set_notified_contact(
        &self,
        tx: &mut Self::Tx,
        own_address: &Address,
        revoked_fpr: &Fingerprint,
        peer_user_id: UserId,
    ) -> StoreResult<()> {
        tx.notified_contacts
            .insert((own_address.clone(), revoked_fpr.clone(), peer_user_id));
        Ok(())
    }

    async fn has_notified_contact(
        &self,
        own_address: &Address,
        revoked_fpr: &Fingerprint,
        peer_user_id: UserId,
    ) -> StoreResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .notified_contacts
            .contains(&(own_address.clone(), revoked_fpr.clone(), peer_user_id)))
    }

    async fn recently_contacted_peers(&self, own_address: &Address) -> StoreResult<Vec<Identity>> {
        Ok(self
            .inner
            .lock()
            .await
            .recent_contacts
            .get(own_address)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_ever_contacted(&self, own_address: &Address, peer_user_id: UserId) -> StoreResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .contacted_by
            .get(own_address)
            .is_some_and(|peers| peers.contains(&peer_user_id)))
    }

    async fn set_replacement(
        &self,
        tx: &mut Self::Tx,
        old_fpr: &Fingerprint,
        new_fpr: &Fingerprint,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()> {
        tx.replacements.insert(
            old_fpr.clone(),
            Replacement {
                new_fingerprint: new_fpr.clone(),
                recorded_at: timestamp,
            },
        );
        Ok(())
    }

    async fn get_replacement(&self, old_fpr: &Fingerprint) -> StoreResult<Option<Replacement>> {
        Ok(self.inner.lock().await.replacements.get(old_fpr).cloned())
    }
}
