// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The narrow *Transport* and *Peer Evaluator* contracts: message framing,
//! outbound delivery and identity rating are all out of scope for this
//! core and live behind these traits instead.

use thiserror::Error;

use crate::crypto::KeyMaterial;
use crate::identifiers::{Address, Identity, Rating};

/// A finished, signed-and-encrypted distribution message, ready to hand to
/// the Transport. `attachments` carries whatever key material the command
/// payload itself doesn't (the group's private key for a `groupCreate`, a
/// replacement key for a `keyreset`) — empty for commands that need none.
/// `auto_consume` mirrors the convention that the receiving engine
/// processes and drops this message without user presentation.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub from: Address,
    pub to: Address,
    pub payload: Vec<u8>,
    pub attachments: Vec<KeyMaterial>,
    pub auto_consume: bool,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no send function is registered for this session")]
    NotRegistered,
    #[error("the transport rejected the message: {0}")]
    Rejected(String),
}

/// A single callback taking ownership of the message and returning an
/// ok/failure status.
pub trait Transport {
    fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// Identity rating and version/feature negotiation, abstracted behind a
/// Peer Evaluator. The Group Engine only ever needs the ordinal [`Rating`]
/// of a single identity or the minimum across several.
pub trait PeerEvaluator {
    fn rating(&self, identity: &Identity) -> Rating;

    fn min_rating<'a>(&self, identities: impl Iterator<Item = &'a Identity>) -> Rating {
        identities
            .map(|identity| self.rating(identity))
            .min()
            .unwrap_or(Rating::FullyAnonymous)
    }
}
