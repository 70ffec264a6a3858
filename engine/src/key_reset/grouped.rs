// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use trustcore_common::codec::Distribution;
use trustcore_common::codec::wire::{KeyResetCommand, KeyResetCommandList};
use trustcore_common::crypto::CryptoProvider;
use trustcore_common::identifiers::{Fingerprint, Identity};
use trustcore_common::transport::{PeerEvaluator, Transport};
use tracing::info;

use crate::outbound::send_distribution;
use crate::store::{IdentityKey, Store};

use super::{KeyResetEngine, KeyResetResult, identity_wire_with_fpr, notify};

/// §4.2.a: every own identity whose default key is `old_fpr` moves to one
/// freshly-generated replacement together, and the move is announced to the
/// rest of the device group *before* the old key is revoked — a device
/// that never sees the announcement should still be able to decrypt with
/// the key it already has.
pub(super) async fn grouped_own_reset<S, C, T, P>(
    engine: &KeyResetEngine<S, C, T, P>,
    old_fpr: &Fingerprint,
    own_identities: Vec<Identity>,
) -> KeyResetResult<()>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    let user_id = own_identities
        .first()
        .map(|identity| identity.user_id)
        .expect("grouped_own_reset is only called with a non-empty identity list");
    let new_fpr = engine.crypto.generate_keypair(&user_id)?;

    let commands: Vec<KeyResetCommand> = own_identities
        .iter()
        .map(|identity| KeyResetCommand {
            identity: identity_wire_with_fpr(identity, old_fpr),
            new_fpr: new_fpr.as_str().as_bytes().to_vec(),
        })
        .collect();
    let distribution = Distribution::KeyReset(KeyResetCommandList::new(commands));

    for identity in &own_identities {
        // Exported fresh per recipient: Transport consumption of one
        // message's attachment must not disturb another's.
        let key_material = engine.crypto.export_key_material(&new_fpr)?;
        send_distribution(
            &engine.transport,
            &identity.address,
            &identity.address,
            &distribution,
            vec![key_material],
        )?;
    }

    // Only now, after the device group has been told, is the old key
    // actually torn down.
    engine.crypto.revoke_key(old_fpr)?;
    engine.crypto.mark_mistrusted(old_fpr)?;

    let mut tx = engine.store.begin().await?;
    for identity in &own_identities {
        let key: IdentityKey = (identity.user_id, identity.address.clone());
        engine.store.set_identity_default_key(&mut tx, &key, Some(new_fpr.clone())).await?;
    }
    engine.store.set_replacement(&mut tx, old_fpr, &new_fpr, chrono::Utc::now()).await?;
    engine.store.commit(tx).await?;

    for identity in &own_identities {
        notify::notify_recent_contacts(engine, &identity.address, old_fpr, &new_fpr).await?;
    }
    info!(%old_fpr, %new_fpr, count = own_identities.len(), "grouped own key reset complete, old key revoked");
    Ok(())
}
