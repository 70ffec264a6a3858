// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Turns a [`Distribution`] command into a signed, transport-ready
//! [`OutboundMessage`] and hands it to the Transport. Shared by the Group
//! Engine and the Key-Reset Engine so neither re-implements the envelope
//! framing.

use trustcore_common::codec::{self, Distribution};
use trustcore_common::crypto::KeyMaterial;
use trustcore_common::identifiers::Address;
use trustcore_common::transport::{OutboundMessage, Transport, TransportError};

/// Encode `command` and send it from `from` to `to`, carrying `attachments`
/// alongside the payload — empty for commands that need no out-of-band key
/// material. `auto_consume` marks the message so the receiving engine
/// processes and drops it without surfacing it for user presentation — true
/// for every command this core emits, since group and key-reset commands
/// are protocol housekeeping, never user-visible content.
pub fn send_distribution<T: Transport>(
    transport: &T,
    from: &Address,
    to: &Address,
    command: &Distribution,
    attachments: Vec<KeyMaterial>,
) -> Result<(), EnvelopeError> {
    let payload = codec::encode_command(command)?;
    transport.send(OutboundMessage {
        from: from.clone(),
        to: to.clone(),
        payload,
        attachments,
        auto_consume: true,
    })?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("codec error: {0}")]
    Codec(#[from] codec::Error),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
