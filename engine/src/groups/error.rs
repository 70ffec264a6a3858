// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;
use trustcore_common::crypto::CryptoError;

use crate::outbound::EnvelopeError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("the envelope's signing fingerprint does not match the claimed identity's key")]
    SignerIdentityMismatch,
    #[error("this device holds no private key for the group identity")]
    NoPrivateKeyForGroup,
    #[error("the group identity is disabled")]
    GroupDisabled,
    #[error("identity is already an active member of this group")]
    AlreadyActiveMember,
    #[error("envelope rating is below the minimum required for distribution commands")]
    InsufficientRating,
}
