// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The durable [`Store`] backend: one SQLite file per device, migrated with
//! `sqlx::migrate!` at connection time.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{SqlitePool, SqliteTransaction};
use trustcore_common::identifiers::{
    Address, Capabilities, CommType, Fingerprint, Identity, TrustLevel, UserId,
};
use uuid::Uuid;

use super::model::{IdentityKey, Member, OwnMembership, Replacement};
use super::{Store, StoreError, StoreResult};

fn comm_type_to_str(comm_type: CommType) -> &'static str {
    match comm_type {
        CommType::Unknown => "unknown",
        CommType::KeyNotFound => "key_not_found",
        CommType::KeyExpired => "key_expired",
        CommType::KeyRevoked => "key_revoked",
        CommType::Mistrusted => "mistrusted",
        CommType::StrongUnconfirmed => "strong_unconfirmed",
        CommType::OpenPgpUnconfirmed => "openpgp_unconfirmed",
        CommType::PepUnconfirmed => "pep_unconfirmed",
        CommType::Pep => "pep",
    }
}

fn comm_type_from_str(raw: &str) -> CommType {
    match raw {
        "key_not_found" => CommType::KeyNotFound,
        "key_expired" => CommType::KeyExpired,
        "key_revoked" => CommType::KeyRevoked,
        "mistrusted" => CommType::Mistrusted,
        "strong_unconfirmed" => CommType::StrongUnconfirmed,
        "openpgp_unconfirmed" => CommType::OpenPgpUnconfirmed,
        "pep_unconfirmed" => CommType::PepUnconfirmed,
        "pep" => CommType::Pep,
        _ => CommType::Unknown,
    }
}

const DEFAULT_OWN_USER_ID_KEY: &str = "default_own_user_id";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to (creating if absent) the SQLite file at `database_url`
    /// and run every pending migration.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    fn identity_from_row(
        user_id: Uuid,
        address: String,
        fingerprint: Option<String>,
        display_name: Option<String>,
        cap_own: bool,
        cap_group_identity: bool,
        cap_device_group: bool,
        cap_not_for_sync: bool,
    ) -> Identity {
        Identity {
            user_id: UserId(user_id),
            address: Address::new(address),
            fingerprint: fingerprint.map(Fingerprint::new),
            display_name,
            capabilities: Capabilities {
                own: cap_own,
                group_identity: cap_group_identity,
                device_group: cap_device_group,
                not_for_sync: cap_not_for_sync,
            },
        }
    }
}

impl Store for SqliteStore {
    type Tx = SqliteTransaction<'static>;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn get_identity(&self, key: &IdentityKey) -> StoreResult<Option<Identity>> {
        let (user_id, address) = (key.0.0, key.1.as_str());
        let row = sqlx::query!(
            "SELECT user_id as \"user_id: Uuid\", address, fingerprint, display_name,
                    cap_own, cap_group_identity, cap_device_group, cap_not_for_sync
             FROM identities WHERE user_id = ? AND address = ?",
            user_id,
            address,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            Self::identity_from_row(
                row.user_id,
                row.address,
                row.fingerprint,
                row.display_name,
                row.cap_own,
                row.cap_group_identity,
                row.cap_device_group,
                row.cap_not_for_sync,
            )
        }))
    }

    async fn upsert_identity(&self, tx: &mut Self::Tx, identity: Identity) -> StoreResult<()> {
        let user_id = identity.user_id.0;
        let address = identity.address.as_str();
        let fingerprint = identity.fingerprint.as_ref().map(|f| f.as_str());
        sqlx::query!(
            "INSERT INTO identities
                (user_id, address, fingerprint, display_name,
                 cap_own, cap_group_identity, cap_device_group, cap_not_for_sync)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, address) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                display_name = excluded.display_name,
                cap_own = excluded.cap_own,
                cap_group_identity = excluded.cap_group_identity,
                cap_device_group = excluded.cap_device_group,
                cap_not_for_sync = excluded.cap_not_for_sync",
            user_id,
            address,
            fingerprint,
            identity.display_name,
            identity.capabilities.own,
            identity.capabilities.group_identity,
            identity.capabilities.device_group,
            identity.capabilities.not_for_sync,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn identities_with_default_key(&self, fpr: &Fingerprint) -> StoreResult<Vec<Identity>> {
        let fpr = fpr.as_str();
        let rows = sqlx::query!(
            "SELECT i.user_id as \"user_id: Uuid\", i.address, i.fingerprint, i.display_name,
                    i.cap_own, i.cap_group_identity, i.cap_device_group, i.cap_not_for_sync
             FROM identities i
             JOIN identity_default_key k ON k.user_id = i.user_id AND k.address = i.address
             WHERE k.fingerprint = ?",
            fpr,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                Self::identity_from_row(
                    row.user_id,
                    row.address,
                    row.fingerprint,
                    row.display_name,
                    row.cap_own,
                    row.cap_group_identity,
                    row.cap_device_group,
                    row.cap_not_for_sync,
                )
            })
            .collect())
    }

    async fn identity_keys_for_user(&self, user_id: UserId) -> StoreResult<Vec<Fingerprint>> {
        let user_id = user_id.0;
        let rows = sqlx::query!(
            "SELECT DISTINCT fingerprint FROM identity_default_key WHERE user_id = ?",
            user_id,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| Fingerprint::new(row.fingerprint)).collect())
    }

    async fn default_own_user_id(&self) -> StoreResult<Option<UserId>> {
        let row = sqlx::query!(
            "SELECT value FROM device_config WHERE key = ?",
            DEFAULT_OWN_USER_ID_KEY,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .and_then(|row| Uuid::parse_str(&row.value).ok())
            .map(UserId))
    }

    async fn set_default_own_user_id(&self, tx: &mut Self::Tx, user_id: UserId) -> StoreResult<()> {
        let value = user_id.0.to_string();
        sqlx::query!(
            "INSERT INTO device_config (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            DEFAULT_OWN_USER_ID_KEY,
            value,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn identity_default_key(&self, key: &IdentityKey) -> StoreResult<Option<Fingerprint>> {
        let (user_id, address) = (key.0.0, key.1.as_str());
        let row = sqlx::query!(
            "SELECT fingerprint FROM identity_default_key WHERE user_id = ? AND address = ?",
            user_id,
            address,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Fingerprint::new(row.fingerprint)))
    }

    async fn set_identity_default_key(
        &self,
        tx: &mut Self::Tx,
        key: &IdentityKey,
        fpr: Option<Fingerprint>,
    ) -> StoreResult<()> {
        let (user_id, address) = (key.0.0, key.1.as_str());
        match fpr {
            Some(fpr) => {
                let fpr = fpr.as_str();
                sqlx::query!(
                    "INSERT INTO identity_default_key (user_id, address, fingerprint)
                     VALUES (?, ?, ?)
                     ON CONFLICT(user_id, address) DO UPDATE SET fingerprint = excluded.fingerprint",
                    user_id,
                    address,
                    fpr,
                )
                .execute(&mut **tx)
                .await?;
            }
            None => {
                sqlx::query!(
                    "DELETE FROM identity_default_key WHERE user_id = ? AND address = ?",
                    user_id,
                    address,
                )
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    async fn user_default_key(&self, user_id: UserId) -> StoreResult<Option<Fingerprint>> {
        let user_id = user_id.0;
        let row = sqlx::query!(
            "SELECT fingerprint FROM user_default_key WHERE user_id = ?",
            user_id,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Fingerprint::new(row.fingerprint)))
    }

    async fn set_user_default_key(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        fpr: Option<Fingerprint>,
    ) -> StoreResult<()> {
        let user_id = user_id.0;
        match fpr {
            Some(fpr) => {
                let fpr = fpr.as_str();
                sqlx::query!(
                    "INSERT INTO user_default_key (user_id, fingerprint) VALUES (?, ?)
                     ON CONFLICT(user_id) DO UPDATE SET fingerprint = excluded.fingerprint",
                    user_id,
                    fpr,
                )
                .execute(&mut **tx)
                .await?;
            }
            None => {
                sqlx::query!("DELETE FROM user_default_key WHERE user_id = ?", user_id)
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }

    async fn get_trust(&self, user_id: UserId, fpr: &Fingerprint) -> StoreResult<Option<TrustLevel>> {
        let (user_id, fpr) = (user_id.0, fpr.as_str());
        let row = sqlx::query!(
            "SELECT comm_type, confirmed FROM trust WHERE user_id = ? AND fingerprint = ?",
            user_id,
            fpr,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| TrustLevel {
            comm_type: comm_type_from_str(&row.comm_type),
            confirmed: row.confirmed,
        }))
    }

    async fn set_trust(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        fpr: &Fingerprint,
        trust: TrustLevel,
    ) -> StoreResult<()> {
        let (user_id, fpr) = (user_id.0, fpr.as_str());
        let comm_type = comm_type_to_str(trust.comm_type);
        sqlx::query!(
            "INSERT INTO trust (user_id, fingerprint, comm_type, confirmed)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, fingerprint) DO UPDATE SET
                comm_type = excluded.comm_type, confirmed = excluded.confirmed",
            user_id,
            fpr,
            comm_type,
            trust.confirmed,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn clear_trust(&self, tx: &mut Self::Tx, user_id: UserId, fpr: &Fingerprint) -> StoreResult<()> {
        let (user_id, fpr) = (user_id.0, fpr.as_str());
        sqlx::query!(
            "DELETE FROM trust WHERE user_id = ? AND fingerprint = ?",
            user_id,
            fpr,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn create_group(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        manager: &IdentityKey,
    ) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (manager_user_id, manager_address) = (manager.0.0, manager.1.as_str());
        let inserted = sqlx::query!(
            "INSERT OR IGNORE INTO groups
                (group_user_id, group_address, manager_user_id, manager_address, active)
             VALUES (?, ?, ?, ?, 1)",
            group_user_id,
            group_address,
            manager_user_id,
            manager_address,
        )
        .execute(&mut **tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::GroupAlreadyExists(group_identity.0));
        }
        Ok(())
    }

    async fn exists_group(&self, group_identity: &IdentityKey) -> StoreResult<bool> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let row = sqlx::query!(
            "SELECT 1 as present FROM groups WHERE group_user_id = ? AND group_address = ?",
            group_user_id,
            group_address,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn enable_group(&self, tx: &mut Self::Tx, group_identity: &IdentityKey) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let updated = sqlx::query!(
            "UPDATE groups SET active = 1 WHERE group_user_id = ? AND group_address = ?",
            group_user_id,
            group_address,
        )
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::GroupNotFound);
        }
        Ok(())
    }

    async fn disable_group(&self, tx: &mut Self::Tx, group_identity: &IdentityKey) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let updated = sqlx::query!(
            "UPDATE groups SET active = 0 WHERE group_user_id = ? AND group_address = ?",
            group_user_id,
            group_address,
        )
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::GroupNotFound);
        }
        Ok(())
    }

    async fn is_group_active(&self, group_identity: &IdentityKey) -> StoreResult<bool> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let row = sqlx::query!(
            "SELECT active FROM groups WHERE group_user_id = ? AND group_address = ?",
            group_user_id,
            group_address,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::GroupNotFound)?;
        Ok(row.active)
    }

    async fn get_group_manager(&self, group_identity: &IdentityKey) -> StoreResult<IdentityKey> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let row = sqlx::query!(
            "SELECT manager_user_id as \"manager_user_id: Uuid\", manager_address
             FROM groups WHERE group_user_id = ? AND group_address = ?",
            group_user_id,
            group_address,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::GroupNotFound)?;
        Ok((UserId(row.manager_user_id), Address::new(row.manager_address)))
    }

    async fn add_member(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
    ) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (member_user_id, member_address) = (member.0.0, member.1.as_str());
        sqlx::query!(
            "INSERT OR IGNORE INTO members
                (group_user_id, group_address, member_user_id, member_address, joined)
             VALUES (?, ?, ?, ?, 0)",
            group_user_id,
            group_address,
            member_user_id,
            member_address,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn remove_member(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
    ) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (member_user_id, member_address) = (member.0.0, member.1.as_str());
        sqlx::query!(
            "DELETE FROM members
             WHERE group_user_id = ? AND group_address = ?
               AND member_user_id = ? AND member_address = ?",
            group_user_id,
            group_address,
            member_user_id,
            member_address,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn set_member_joined(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
        joined: bool,
    ) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (member_user_id, member_address) = (member.0.0, member.1.as_str());
        let updated = sqlx::query!(
            "UPDATE members SET joined = ?
             WHERE group_user_id = ? AND group_address = ?
               AND member_user_id = ? AND member_address = ?",
            joined,
            group_user_id,
            group_address,
            member_user_id,
            member_address,
        )
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotAMember);
        }
        Ok(())
    }

    async fn get_members(
        &self,
        group_identity: &IdentityKey,
        only_active: bool,
    ) -> StoreResult<Vec<Member>> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let rows = sqlx::query!(
            "SELECT member_user_id as \"member_user_id: Uuid\", member_address, joined
             FROM members WHERE group_user_id = ? AND group_address = ?",
            group_user_id,
            group_address,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter(|row| !only_active || row.joined)
            .map(|row| Member {
                identity: (UserId(row.member_user_id), Address::new(row.member_address)),
                joined: row.joined,
            })
            .collect())
    }

    async fn is_invited_member(
        &self,
        group_identity: &IdentityKey,
        identity: &IdentityKey,
    ) -> StoreResult<bool> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (member_user_id, member_address) = (identity.0.0, identity.1.as_str());
        let row = sqlx::query!(
            "SELECT 1 as present FROM members
             WHERE group_user_id = ? AND group_address = ?
               AND member_user_id = ? AND member_address = ?",
            group_user_id,
            group_address,
            member_user_id,
            member_address,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn is_active_member(
        &self,
        group_identity: &IdentityKey,
        identity: &IdentityKey,
    ) -> StoreResult<bool> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (member_user_id, member_address) = (identity.0.0, identity.1.as_str());
        let row = sqlx::query!(
            "SELECT 1 as present FROM members
             WHERE group_user_id = ? AND group_address = ?
               AND member_user_id = ? AND member_address = ? AND joined = 1",
            group_user_id,
            group_address,
            member_user_id,
            member_address,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn add_own_membership(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
        manager: &IdentityKey,
    ) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (own_user_id, own_address) = (own_identity.0.0, own_identity.1.as_str());
        let (manager_user_id, manager_address) = (manager.0.0, manager.1.as_str());
        sqlx::query!(
            "INSERT INTO own_memberships
                (group_user_id, group_address, own_user_id, own_address,
                 manager_user_id, manager_address, joined)
             VALUES (?, ?, ?, ?, ?, ?, 0)
             ON CONFLICT(group_user_id, group_address, own_user_id, own_address) DO UPDATE SET
                manager_user_id = excluded.manager_user_id,
                manager_address = excluded.manager_address",
            group_user_id,
            group_address,
            own_user_id,
            own_address,
            manager_user_id,
            manager_address,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn set_own_membership_joined(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (own_user_id, own_address) = (own_identity.0.0, own_identity.1.as_str());
        let updated = sqlx::query!(
            "UPDATE own_memberships SET joined = 1
             WHERE group_user_id = ? AND group_address = ?
               AND own_user_id = ? AND own_address = ?",
            group_user_id,
            group_address,
            own_user_id,
            own_address,
        )
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::OwnMembershipNotFound);
        }
        Ok(())
    }

    async fn set_own_membership_left(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<()> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (own_user_id, own_address) = (own_identity.0.0, own_identity.1.as_str());
        sqlx::query!(
            "DELETE FROM own_memberships
             WHERE group_user_id = ? AND group_address = ?
               AND own_user_id = ? AND own_address = ?",
            group_user_id,
            group_address,
            own_user_id,
            own_address,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn get_own_membership(
        &self,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<Option<OwnMembership>> {
        let (group_user_id, group_address) = (group_identity.0.0, group_identity.1.as_str());
        let (own_user_id, own_address) = (own_identity.0.0, own_identity.1.as_str());
        let row = sqlx::query!(
            "SELECT manager_user_id as \"manager_user_id: Uuid\", manager_address, joined
             FROM own_memberships
             WHERE group_user_id = ? AND group_address = ?
               AND own_user_id = ? AND own_address = ?",
            group_user_id,
            group_address,
            own_user_id,
            own_address,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| OwnMembership {
            own_identity: own_identity.clone(),
            manager: (UserId(row.manager_user_id), Address::new(row.manager_address)),
            joined: row.joined,
        }))
    }

    async fn set_notified_contact(
        &self,
        tx: &mut Self::Tx,
        own_address: &Address,
        revoked_fpr: &Fingerprint,
        peer_user_id: UserId,
    ) -> StoreResult<()> {
        let (own_address, revoked_fpr, peer_user_id) =
            (own_address.as_str(), revoked_fpr.as_str(), peer_user_id.0);
        sqlx::query!(
            "INSERT OR IGNORE INTO notified_contacts (own_address, revoked_fpr, peer_user_id)
             VALUES (?, ?, ?)",
            own_address,
            revoked_fpr,
            peer_user_id,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn has_notified_contact(
        &self,
        own_address: &Address,
        revoked_fpr: &Fingerprint,
        peer_user_id: UserId,
    ) -> StoreResult<bool> {
        let (own_address, revoked_fpr, peer_user_id) =
            (own_address.as_str(), revoked_fpr.as_str(), peer_user_id.0);
        let row = sqlx::query!(
            "SELECT 1 as present FROM notified_contacts
             WHERE own_address = ? AND revoked_fpr = ? AND peer_user_id = ?",
            own_address,
            revoked_fpr,
            peer_user_id,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn recently_contacted_peers(&self, own_address: &Address) -> StoreResult<Vec<Identity>> {
        let own_address = own_address.as_str();
        let rows = sqlx::query!(
            "SELECT i.user_id as \"user_id: Uuid\", i.address, i.fingerprint, i.display_name,
                    i.cap_own, i.cap_group_identity, i.cap_device_group, i.cap_not_for_sync
             FROM recent_contacts rc
             JOIN identities i ON i.user_id = rc.peer_user_id AND i.address = rc.peer_address
             WHERE rc.own_address = ?
             ORDER BY rc.last_contact_at DESC",
            own_address,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                Self::identity_from_row(
                    row.user_id,
                    row.address,
                    row.fingerprint,
                    row.display_name,
                    row.cap_own,
                    row.cap_group_identity,
                    row.cap_device_group,
                    row.cap_not_for_sync,
                )
            })
            .collect())
    }

    async fn has_ever_contacted(&self, own_address: &Address, peer_user_id: UserId) -> StoreResult<bool> {
        let (own_address, peer_user_id) = (own_address.as_str(), peer_user_id.0);
        let row = sqlx::query!(
            "SELECT 1 as present FROM recent_contacts WHERE own_address = ? AND peer_user_id = ?",
            own_address,
            peer_user_id,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn set_replacement(
        &self,
        tx: &mut Self::Tx,
        old_fpr: &Fingerprint,
        new_fpr: &Fingerprint,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()> {
        let (old_fpr, new_fpr) = (old_fpr.as_str(), new_fpr.as_str());
        sqlx::query!(
            "INSERT INTO replacements (old_fpr, new_fpr, recorded_at) VALUES (?, ?, ?)
             ON CONFLICT(old_fpr) DO UPDATE SET
                new_fpr = excluded.new_fpr, recorded_at = excluded.recorded_at",
            old_fpr,
            new_fpr,
            timestamp,
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn get_replacement(&self, old_fpr: &Fingerprint) -> StoreResult<Option<Replacement>> {
        let old_fpr = old_fpr.as_str();
        let row = sqlx::query!(
            "SELECT new_fpr, recorded_at as \"recorded_at: DateTime<Utc>\"
             FROM replacements WHERE old_fpr = ?",
            old_fpr,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Replacement {
            new_fingerprint: Fingerprint::new(row.new_fpr),
            recorded_at: row.recorded_at,
        }))
    }
}
