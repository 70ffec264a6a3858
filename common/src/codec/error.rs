// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

use super::DistributionCodec;

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty input slice")]
    EmptyInputSlice,
    #[error("unknown major codec version {0} — fail closed")]
    UnknownMajorVersion(u8),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Error)]
pub struct CodecError {
    pub(super) codec_version: DistributionCodec,
    pub(super) error: ciborium::de::Error<std::io::Error>,
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.codec_version, self.error)
    }
}

#[derive(Debug, Error)]
pub struct EncodeError {
    pub(super) error: ciborium::ser::Error<std::io::Error>,
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}
