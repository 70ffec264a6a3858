// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;
use trustcore_common::codec;
use trustcore_common::crypto::CryptoError;
use trustcore_common::transport::TransportError;

use crate::groups::GroupError;
use crate::key_reset::KeyResetError;
use crate::store::StoreError;

/// The aggregate error type returned from every public engine entry point.
/// A message that is simply not for this engine (wrong recipient, stale
/// envelope already superseded) is not an error at all — it surfaces as
/// `Ok(Outcome::Ignored)` from the dispatcher, never as a variant here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("group engine error: {0}")]
    Group(#[from] GroupError),
    #[error("key-reset engine error: {0}")]
    KeyReset(#[from] KeyResetError),
    #[error("codec error: {0}")]
    Codec(#[from] codec::Error),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type EngineResult<T> = Result<T, EngineError>;
