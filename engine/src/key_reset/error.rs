// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;
use trustcore_common::crypto::CryptoError;

use crate::outbound::EnvelopeError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum KeyResetError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("this device holds no private key for the key being reset")]
    KeyNotOwned,
    #[error("malformed key-reset command")]
    Malformed,
    #[error("the envelope signer's key is revoked")]
    SignerRevoked,
    #[error("the envelope signer's key is mistrusted")]
    SignerMistrusted,
    #[error("an own sender's key must be trusted at pEp or better to issue a reset")]
    SignerNotTrusted,
    #[error("key-not-reset: no trust entry exists for the claimed old key")]
    UnknownOldKey,
    #[error("a peer's old key must already be revoked before its replacement is accepted")]
    PeerOldKeyNotRevoked,
    #[error("the proposed new key is itself already revoked")]
    NewKeyRevoked,
}
