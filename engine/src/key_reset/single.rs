// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use trustcore_common::crypto::CryptoProvider;
use trustcore_common::identifiers::{Fingerprint, Identity, TrustLevel};
use trustcore_common::transport::{PeerEvaluator, Transport};
use tracing::info;

use crate::store::{IdentityKey, Store};

use super::{KeyResetEngine, KeyResetResult, notify};

/// §4.2.b, own key: revoke, replace, and tell anyone who might still be
/// encrypting to the old key.
pub(super) async fn single_own_reset<S, C, T, P>(
    engine: &KeyResetEngine<S, C, T, P>,
    old_fpr: &Fingerprint,
    identity: &Identity,
) -> KeyResetResult<()>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    engine.crypto.revoke_key(old_fpr)?;
    let new_fpr = engine.crypto.generate_keypair(&identity.user_id)?;
    engine.crypto.mark_mistrusted(old_fpr)?;

    let key: IdentityKey = (identity.user_id, identity.address.clone());
    let clear_user_default = engine.store.user_default_key(identity.user_id).await? == Some(old_fpr.clone());

    let mut tx = engine.store.begin().await?;
    engine.store.set_identity_default_key(&mut tx, &key, Some(new_fpr.clone())).await?;
    if clear_user_default {
        engine.store.set_user_default_key(&mut tx, identity.user_id, None).await?;
    }
    engine.store.set_replacement(&mut tx, old_fpr, &new_fpr, chrono::Utc::now()).await?;
    // Never *confirmed* from arithmetic alone — only a human action sets that bit.
    let comm_type = engine.crypto.raw_rating(&new_fpr)?;
    engine.store.set_trust(&mut tx, identity.user_id, &new_fpr, TrustLevel::new(comm_type)).await?;
    engine.store.commit(tx).await?;

    notify::notify_recent_contacts(engine, &identity.address, old_fpr, &new_fpr).await?;
    info!(%old_fpr, %new_fpr, user = ?identity.user_id, "single own key reset complete, old key revoked");
    Ok(())
}

/// §4.2.b, peer key: we have no say over what the peer does next, so there
/// is nothing to replace and nothing to notify — just stop trusting and
/// stop holding the dead key. The next message from this peer starts a
/// fresh TOFU.
pub(super) async fn single_peer_reset<S, C, T, P>(
    engine: &KeyResetEngine<S, C, T, P>,
    old_fpr: &Fingerprint,
    identity: &Identity,
) -> KeyResetResult<()>
where
    S: Store,
    C: CryptoProvider,
    T: Transport,
    P: PeerEvaluator,
{
    let key: IdentityKey = (identity.user_id, identity.address.clone());
    let clear_user_default = engine.store.user_default_key(identity.user_id).await? == Some(old_fpr.clone());

    let mut tx = engine.store.begin().await?;
    engine.store.clear_trust(&mut tx, identity.user_id, old_fpr).await?;
    engine.store.set_identity_default_key(&mut tx, &key, None).await?;
    if clear_user_default {
        engine.store.set_user_default_key(&mut tx, identity.user_id, None).await?;
    }
    engine.store.commit(tx).await?;

    if engine.crypto.is_mistrusted(old_fpr)? {
        engine.crypto.clear_mistrusted(old_fpr)?;
    }
    engine.crypto.delete_key(old_fpr)?;
    info!(%old_fpr, user = ?identity.user_id, "peer key reset, old key deleted");
    Ok(())
}
