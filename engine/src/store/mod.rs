// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Unified access to the persisted trust store: identities, trust levels,
//! managed-group membership and the notified-contact/replacement ledgers
//! the Key-Reset Engine relies on.
//!
//! [`Store`] is generated from [`LocalStore`] the way the rest of this
//! workspace generates a `Send`-bound async trait from a plain one: engines
//! are generic over `S: Store` rather than boxing it as `dyn Store`, so the
//! associated [`LocalStore::Tx`] type stays a plain associated type with no
//! lifetime parameter — both backends hand out an owned transaction value
//! (`sqlx::Transaction<'static, _>` for the SQLite backend, an owned mutex
//! guard for the in-memory one).

use chrono::{DateTime, Utc};
use trustcore_common::identifiers::{Address, Fingerprint, Identity, TrustLevel, UserId};

pub mod error;
pub mod memory;
pub mod model;
pub mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{IdentityKey, Member, OwnMembership, Replacement};
pub use sqlite::SqliteStore;

/// The result type of a failable [`Store`] method.
pub type StoreResult<T> = Result<T, StoreError>;

/// Unified access to the trust store.
///
/// Every read here is expected to be atomic on its own (a single query);
/// callers that need several writes to land together bracket them with
/// [`LocalStore::begin`]/[`LocalStore::commit`] and thread the returned
/// transaction through the mutating calls. Dropping a transaction without
/// committing rolls it back — the SQLite backend gets this for free from
/// `sqlx::Transaction`'s own `Drop` impl, and the in-memory backend mirrors
/// it by never applying buffered writes until commit.
#[allow(async_fn_in_trait, reason = "engines are generic over Store, never boxed")]
#[trait_variant::make(Store: Send)]
pub trait LocalStore {
    /// A single bracketed sequence of writes.
    type Tx: Send;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;

    // --- identities & trust -------------------------------------------------

    async fn get_identity(&self, key: &IdentityKey) -> StoreResult<Option<Identity>>;

    async fn upsert_identity(&self, tx: &mut Self::Tx, identity: Identity) -> StoreResult<()>;

    /// Every identity row whose current default key is `fpr`, across every
    /// user — used by the grouped own key-reset regime to find every own
    /// device that shares the key being replaced.
    async fn identities_with_default_key(&self, fpr: &Fingerprint) -> StoreResult<Vec<Identity>>;

    /// Every distinct default key currently installed for any identity row
    /// belonging to `user_id` — used by the `key_reset(None, user_id)`
    /// regime to recurse over "every key this user owns" without a
    /// specific fingerprint to start from.
    async fn identity_keys_for_user(&self, user_id: UserId) -> StoreResult<Vec<Fingerprint>>;

    async fn default_own_user_id(&self) -> StoreResult<Option<UserId>>;

    async fn set_default_own_user_id(&self, tx: &mut Self::Tx, user_id: UserId) -> StoreResult<()>;

    async fn identity_default_key(
        &self,
        key: &IdentityKey,
    ) -> StoreResult<Option<Fingerprint>>;

    async fn set_identity_default_key(
        &self,
        tx: &mut Self::Tx,
        key: &IdentityKey,
        fpr: Option<Fingerprint>,
    ) -> StoreResult<()>;

    async fn user_default_key(&self, user_id: UserId) -> StoreResult<Option<Fingerprint>>;

    async fn set_user_default_key(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        fpr: Option<Fingerprint>,
    ) -> StoreResult<()>;

    async fn get_trust(
        &self,
        user_id: UserId,
        fpr: &Fingerprint,
    ) -> StoreResult<Option<TrustLevel>>;

    async fn set_trust(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        fpr: &Fingerprint,
        trust: TrustLevel,
    ) -> StoreResult<()>;

    async fn clear_trust(
        &self,
        tx: &mut Self::Tx,
        user_id: UserId,
        fpr: &Fingerprint,
    ) -> StoreResult<()>;

    // --- managed groups ------------------------------------------------------

    async fn create_group(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        manager: &IdentityKey,
    ) -> StoreResult<()>;

    async fn exists_group(&self, group_identity: &IdentityKey) -> StoreResult<bool>;

    async fn enable_group(&self, tx: &mut Self::Tx, group_identity: &IdentityKey) -> StoreResult<()>;

    async fn disable_group(&self, tx: &mut Self::Tx, group_identity: &IdentityKey) -> StoreResult<()>;

    async fn is_group_active(&self, group_identity: &IdentityKey) -> StoreResult<bool>;

    async fn get_group_manager(&self, group_identity: &IdentityKey) -> StoreResult<IdentityKey>;

    async fn add_member(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
    ) -> StoreResult<()>;

    async fn remove_member(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
    ) -> StoreResult<()>;

    async fn set_member_joined(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        member: &IdentityKey,
        joined: bool,
    ) -> StoreResult<()>;

    /// `only_active = true` excludes invited-but-not-yet-adopted members.
    async fn get_members(
        &self,
        group_identity: &IdentityKey,
        only_active: bool,
    ) -> StoreResult<Vec<Member>>;

    async fn is_invited_member(
        &self,
        group_identity: &IdentityKey,
        identity: &IdentityKey,
    ) -> StoreResult<bool>;

    async fn is_active_member(
        &self,
        group_identity: &IdentityKey,
        identity: &IdentityKey,
    ) -> StoreResult<bool>;

    // --- own membership (this device's stake in a group it joined) --------

    async fn add_own_membership(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
        manager: &IdentityKey,
    ) -> StoreResult<()>;

    async fn set_own_membership_joined(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<()>;

    async fn set_own_membership_left(
        &self,
        tx: &mut Self::Tx,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<()>;

    async fn get_own_membership(
        &self,
        group_identity: &IdentityKey,
        own_identity: &IdentityKey,
    ) -> StoreResult<Option<OwnMembership>>;

    // --- key-reset ledgers ---------------------------------------------------

    async fn set_notified_contact(
        &self,
        tx: &mut Self::Tx,
        own_address: &Address,
        revoked_fpr: &Fingerprint,
        peer_user_id: UserId,
    ) -> StoreResult<()>;

    async fn has_notified_contact(
        &self,
        own_address: &Address,
        revoked_fpr: &Fingerprint,
        peer_user_id: UserId,
    ) -> StoreResult<bool>;

    /// Identities this `own_address` has exchanged messages with recently
    /// enough to be worth a standalone key-reset notification.
    async fn recently_contacted_peers(&self, own_address: &Address) -> StoreResult<Vec<Identity>>;

    /// Whether `peer_user_id` has ever sent anything to `own_address` —
    /// the asymmetric half of the "only notify peers who have contacted us"
    /// rule, kept distinct from [`LocalStore::recently_contacted_peers`]
    /// since recency and having-ever-contacted are different questions.
    async fn has_ever_contacted(&self, own_address: &Address, peer_user_id: UserId) -> StoreResult<bool>;

    async fn set_replacement(
        &self,
        tx: &mut Self::Tx,
        old_fpr: &Fingerprint,
        new_fpr: &Fingerprint,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn get_replacement(&self, old_fpr: &Fingerprint) -> StoreResult<Option<Replacement>>;
}
