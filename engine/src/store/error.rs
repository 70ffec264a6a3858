// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;
use trustcore_common::identifiers::{Fingerprint, UserId};

/// Everything a [`super::Store`] call can fail with. "Not found" variants
/// are ordinary control flow for the engines built on top of this trait;
/// `Backend` covers anything infrastructural (disk full, pool exhausted,
/// connection lost).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no group row for this identity")]
    GroupNotFound,
    #[error("identity {user_id} has no row at this address")]
    IdentityNotFound { user_id: UserId },
    #[error("identity is not a member (invited or active) of this group")]
    NotAMember,
    #[error("no own-membership row for this group/identity pair")]
    OwnMembershipNotFound,
    #[error("group {0:?} already exists")]
    GroupAlreadyExists(UserId),
    #[error("no default own identity is configured for this device")]
    NoDefaultOwnIdentity,
    #[error("key {0} has no trust row")]
    TrustNotFound(Fingerprint),
    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
