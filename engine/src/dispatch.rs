// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The inbound demultiplexer: decode a [`Distribution`] off the wire and
//! route it to whichever of the Group Engine or Key-Reset Engine owns it.
//! Neither engine decodes its own envelopes — that's entirely this
//! module's job, so a new `Distribution` variant only ever needs a new
//! match arm here.

use trustcore_common::codec::{self, Distribution};
use trustcore_common::codec::wire::ManagedGroupCommand;
use trustcore_common::crypto::{CryptoProvider, KeyMaterial};
use trustcore_common::identifiers::{Address, Fingerprint, Rating};
use trustcore_common::transport::{PeerEvaluator, Transport};
use tracing::warn;

use crate::Outcome;
use crate::error::EngineResult;
use crate::groups::GroupEngine;
use crate::key_reset::KeyResetEngine;
use crate::store::{IdentityKey, Store};

/// Everything [`dispatch`] needs that the raw payload bytes alone don't
/// carry: who signed the envelope, who it's from, and the key material any
/// attachments on the transport delivered alongside it.
///
/// `key_materials` holds at most one entry for a `groupCreate` (the group's
/// private key, or none if the transport hasn't surfaced it yet) and
/// exactly one entry per command for a `keyreset` list, in order.
///
/// `rating` is the caller's trust judgment of the sender, trusted as-is —
/// the Group Engine's three managed-group handlers reject envelopes rated
/// below [`Rating::MINIMUM_FOR_DISTRIBUTION`].
pub struct InboundEnvelope<'a> {
    pub signer_fpr: Fingerprint,
    pub sender: IdentityKey,
    pub own_address: Address,
    pub payload: &'a [u8],
    pub key_materials: Vec<KeyMaterial>,
    pub rating: Rating,
}

/// Decode `envelope.payload` and hand it to whichever engine owns its
/// [`Distribution`] variant.
pub async fn dispatch<S, C, T, P>(
    groups: &GroupEngine<S, C, T, P>,
    key_reset: &KeyResetEngine<S, C, T, P>,
    envelope: &InboundEnvelope<'_>,
) -> EngineResult<Outcome>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    let distribution: Distribution = match codec::decode_command(envelope.payload) {
        Ok(distribution) => distribution,
        Err(error) => {
            warn!(sender = ?envelope.sender, %error, "dropping envelope that failed to decode");
            return Err(error.into());
        }
    };

    match distribution {
        Distribution::ManagedGroup(ManagedGroupCommand::GroupCreate(create)) => {
            let material = envelope.key_materials.first();
            Ok(groups
                .receive_group_create(&envelope.signer_fpr, &create, material, envelope.rating, &envelope.own_address)
                .await?)
        }
        Distribution::ManagedGroup(ManagedGroupCommand::GroupAdopted(adopted)) => {
            Ok(groups
                .receive_group_adopted(&envelope.signer_fpr, &adopted, envelope.rating)
                .await?)
        }
        Distribution::ManagedGroup(ManagedGroupCommand::GroupDissolve(dissolve)) => {
            Ok(groups
                .receive_group_dissolve(&envelope.signer_fpr, &dissolve, envelope.rating)
                .await?)
        }
        Distribution::KeyReset(command_list) => Ok(key_reset
            .receive_key_reset(&envelope.signer_fpr, &envelope.sender, &command_list, &envelope.key_materials)
            .await?),
    }
}
