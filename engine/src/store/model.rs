// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Row-shaped types the [`super::Store`] trait reads and writes. These are
//! deliberately thinner than [`trustcore_common::identifiers::Identity`]:
//! an identity is a value the whole crate shares, while these rows are the
//! store's own join/lookup shapes.

use chrono::{DateTime, Utc};
use trustcore_common::identifiers::{Address, Fingerprint, UserId};

/// The natural key of an identity row: a user clustering key plus the
/// address it was seen at. Threaded through most [`super::Store`] calls in
/// place of the full [`trustcore_common::identifiers::Identity`] so that
/// engines don't need to carry display names and capability flags around
/// just to name a row.
pub type IdentityKey = (UserId, Address);

/// One row of the group membership table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub identity: IdentityKey,
    pub joined: bool,
}

/// The local device's own participation in a managed group: which own
/// identity holds membership, under which manager, and whether it has
/// completed the adoption handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnMembership {
    pub own_identity: IdentityKey,
    pub manager: IdentityKey,
    pub joined: bool,
}

/// A revoked-to-replacement fingerprint mapping, recorded so that an
/// inbound `keyreset` referencing an already-superseded key can be
/// resolved forward instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub new_fingerprint: Fingerprint,
    pub recorded_at: DateTime<Utc>,
}
