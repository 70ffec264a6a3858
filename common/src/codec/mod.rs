// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A bidirectional, deterministic codec between [`wire::Distribution`] and
//! a compact binary form, versioned by a `(major, minor)` pair carried in
//! the encoding: a fixed-width version header followed by a CBOR-encoded
//! payload, with unknown minor versions decoding best-effort (serde/ciborium
//! tolerate additions) and unknown major versions failing closed before the
//! payload is touched.

use serde::{Serialize, de::DeserializeOwned};

pub mod error;
pub mod wire;

#[cfg(test)]
mod tests;

pub use error::Error;
pub use wire::Distribution;

/// The codec's own envelope version — independent of the `(version_major,
/// version_minor)` pair embedded in a [`wire::KeyResetCommandList`], which
/// versions the *command list* rather than the bytes-on-the-wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct DistributionCodec {
    major: u8,
    minor: u8,
}

impl DistributionCodec {
    pub const CURRENT: DistributionCodec = DistributionCodec { major: 1, minor: 0 };

    /// The highest major version this build understands. Any encoded
    /// major greater than this fails closed.
    const MAX_KNOWN_MAJOR: u8 = 1;

    pub fn major(self) -> u8 {
        self.major
    }

    pub fn minor(self) -> u8 {
        self.minor
    }

    fn from_header(major: u8, minor: u8) -> Result<Self, Error> {
        if major > Self::MAX_KNOWN_MAJOR {
            return Err(Error::UnknownMajorVersion(major));
        }
        Ok(Self { major, minor })
    }
}

/// Encode `value` into `DistributionCodec::CURRENT`'s wire form: two
/// version bytes followed by the CBOR-encoded payload.
pub fn encode_command<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    let codec = DistributionCodec::CURRENT;
    let mut buf = vec![codec.major, codec.minor];
    ciborium::into_writer(value, &mut buf).map_err(|error| error::EncodeError { error })?;
    Ok(buf)
}

/// Decode a value previously produced by [`encode_command`]. Unknown minor
/// versions are accepted (the payload is still CBOR the current decoder
/// understands structurally); an unknown major version is rejected before
/// any payload byte is interpreted, so a corrupted/future message can never
/// partially mutate caller state.
pub fn decode_command<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    let [major, minor, payload @ ..] = bytes else {
        return Err(Error::EmptyInputSlice);
    };
    let codec_version = DistributionCodec::from_header(*major, *minor)?;
    ciborium::from_reader(payload).map_err(|error| {
        Error::Codec(error::CodecError {
            codec_version,
            error,
        })
    })
}
