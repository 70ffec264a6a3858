// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use trustcore_common::codec::Distribution;
use trustcore_common::codec::wire::{KeyResetCommand, KeyResetCommandList};
use trustcore_common::crypto::CryptoProvider;
use trustcore_common::identifiers::{Address, Fingerprint};
use trustcore_common::transport::{PeerEvaluator, Transport};
use tracing::debug;

use crate::outbound::send_distribution;
use crate::store::Store;

use super::{KeyResetEngine, KeyResetResult, identity_wire_with_fpr};

/// §4.2.c: a standalone key-reset notification, carrying the new key's
/// public half only, to every recently-contacted peer that has itself
/// ever written to `own_from` — contact must be mutual, or we'd be
/// announcing our key change to addresses that have never heard of us.
pub(super) async fn notify_recent_contacts<S, C, T, P>(
    engine: &KeyResetEngine<S, C, T, P>,
    own_from: &Address,
    old_fpr: &Fingerprint,
    new_fpr: &Fingerprint,
) -> KeyResetResult<()>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    let peers = engine.store.recently_contacted_peers(own_from).await?;
    for peer in peers {
        if peer.own() || &peer.address == own_from {
            continue;
        }
        if engine.store.has_notified_contact(own_from, old_fpr, peer.user_id).await? {
            continue;
        }
        if !engine.store.has_ever_contacted(own_from, peer.user_id).await? {
            continue;
        }

        let command = KeyResetCommand {
            identity: identity_wire_with_fpr(&peer, old_fpr),
            new_fpr: new_fpr.as_str().as_bytes().to_vec(),
        };
        let distribution = Distribution::KeyReset(KeyResetCommandList::new(vec![command]));
        let key_material = engine.crypto.export_public_key_material(new_fpr)?;
        send_distribution(&engine.transport, own_from, &peer.address, &distribution, vec![key_material])?;

        let mut tx = engine.store.begin().await?;
        engine.store.set_notified_contact(&mut tx, own_from, old_fpr, peer.user_id).await?;
        engine.store.commit(tx).await?;
        debug!(%old_fpr, %new_fpr, peer = ?peer.user_id, "notified recent contact of key reset");
    }
    Ok(())
}
