// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use trustcore_common::codec::wire;
use trustcore_common::crypto::CryptoProvider;
use trustcore_common::identifiers::{Address, CommType, Fingerprint, Identity, TrustLevel, UserId};
use trustcore_common::test_support::{MockCryptoProvider, MockPeerEvaluator, MockTransport};

use crate::store::MemoryStore;

use super::*;

type TestEngine = KeyResetEngine<MemoryStore, MockCryptoProvider, MockTransport, MockPeerEvaluator>;

fn identity(name: &str) -> Identity {
    Identity::new(UserId::random(), Address::new(format!("{name}@example.org")))
}

async fn engine() -> TestEngine {
    KeyResetEngine::new(
        MemoryStore::new(),
        MockCryptoProvider::new(),
        MockTransport::new(),
        MockPeerEvaluator::new(),
    )
}

#[tokio::test]
async fn single_own_key_reset_replaces_the_default_and_revokes_the_old_key() {
    let engine = engine().await;
    let old_fpr = engine.crypto.seed_keypair(true);
    let mut own = identity("alice");
    own.capabilities.own = true;
    own.fingerprint = Some(old_fpr.clone());
    let key: IdentityKey = (own.user_id, own.address.clone());

    let mut tx = engine.store.begin().await.unwrap();
    engine.store.upsert_identity(&mut tx, own.clone()).await.unwrap();
    engine.store.set_identity_default_key(&mut tx, &key, Some(old_fpr.clone())).await.unwrap();
    engine.store.commit(tx).await.unwrap();

    engine.key_reset(Some(&old_fpr), None).await.unwrap();

    assert!(engine.crypto.is_revoked(&old_fpr).unwrap());
    assert!(engine.crypto.is_mistrusted(&old_fpr).unwrap());
    let new_fpr = engine.store.identity_default_key(&key).await.unwrap().unwrap();
    assert_ne!(new_fpr, old_fpr);
    let replacement = engine.store.get_replacement(&old_fpr).await.unwrap().unwrap();
    assert_eq!(replacement.new_fingerprint, new_fpr);
}

#[tokio::test]
async fn grouped_own_reset_sends_a_single_self_addressed_command_list() {
    let engine = engine().await;
    let old_fpr = engine.crypto.seed_keypair(true);
    let mut own = identity("alice");
    own.capabilities.own = true;
    own.capabilities.device_group = true;
    own.fingerprint = Some(old_fpr.clone());
    let key: IdentityKey = (own.user_id, own.address.clone());

    let mut tx = engine.store.begin().await.unwrap();
    engine.store.upsert_identity(&mut tx, own.clone()).await.unwrap();
    engine.store.set_identity_default_key(&mut tx, &key, Some(old_fpr.clone())).await.unwrap();
    engine.store.commit(tx).await.unwrap();

    engine.key_reset(Some(&old_fpr), None).await.unwrap();

    let sent = engine.transport.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, own.address);
    assert!(engine.crypto.is_revoked(&old_fpr).unwrap());
    let new_fpr = engine.store.identity_default_key(&key).await.unwrap().unwrap();
    assert_ne!(new_fpr, old_fpr);
}

#[tokio::test]
async fn peer_key_reset_clears_the_default_and_deletes_the_key() {
    let engine = engine().await;
    let peer_fpr = engine.crypto.seed_keypair(false);
    let mut peer = identity("bob");
    peer.fingerprint = Some(peer_fpr.clone());
    let key: IdentityKey = (peer.user_id, peer.address.clone());

    let mut tx = engine.store.begin().await.unwrap();
    engine.store.upsert_identity(&mut tx, peer.clone()).await.unwrap();
    engine.store.set_identity_default_key(&mut tx, &key, Some(peer_fpr.clone())).await.unwrap();
    engine
        .store
        .set_trust(&mut tx, peer.user_id, &peer_fpr, TrustLevel::new(CommType::PepUnconfirmed))
        .await
        .unwrap();
    engine.store.commit(tx).await.unwrap();

    engine.key_reset(Some(&peer_fpr), None).await.unwrap();

    assert_eq!(engine.store.identity_default_key(&key).await.unwrap(), None);
    assert_eq!(engine.store.get_trust(peer.user_id, &peer_fpr).await.unwrap(), None);
}

#[tokio::test]
async fn own_key_reset_notifies_a_mutually_contacted_recent_peer() {
    let engine = engine().await;
    let old_fpr = engine.crypto.seed_keypair(true);
    let mut own = identity("alice");
    own.capabilities.own = true;
    own.fingerprint = Some(old_fpr.clone());
    let key: IdentityKey = (own.user_id, own.address.clone());

    let peer = identity("bob");
    engine.store.seed_recent_contact(&own.address, peer.clone()).await;
    engine.store.seed_contacted_by(&own.address, peer.user_id).await;

    let mut tx = engine.store.begin().await.unwrap();
    engine.store.upsert_identity(&mut tx, own.clone()).await.unwrap();
    engine.store.set_identity_default_key(&mut tx, &key, Some(old_fpr.clone())).await.unwrap();
    engine.store.commit(tx).await.unwrap();

    engine.key_reset(Some(&old_fpr), None).await.unwrap();

    let sent = engine.transport.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, peer.address);
    assert!(engine.store.has_notified_contact(&own.address, &old_fpr, peer.user_id).await.unwrap());
}

#[tokio::test]
async fn a_peer_with_no_recorded_contact_is_not_notified() {
    let engine = engine().await;
    let old_fpr = engine.crypto.seed_keypair(true);
    let mut own = identity("alice");
    own.capabilities.own = true;
    own.fingerprint = Some(old_fpr.clone());
    let key: IdentityKey = (own.user_id, own.address.clone());

    let peer = identity("bob");
    // Recently contacted by us, but never the other way around.
    engine.store.seed_recent_contact(&own.address, peer.clone()).await;

    let mut tx = engine.store.begin().await.unwrap();
    engine.store.upsert_identity(&mut tx, own.clone()).await.unwrap();
    engine.store.set_identity_default_key(&mut tx, &key, Some(old_fpr.clone())).await.unwrap();
    engine.store.commit(tx).await.unwrap();

    engine.key_reset(Some(&old_fpr), None).await.unwrap();

    assert!(engine.transport.sent_messages().is_empty());
}

#[tokio::test]
async fn receive_rejects_reset_signed_by_a_revoked_key() {
    let engine = engine().await;
    let signer_fpr = engine.crypto.seed_keypair(true);
    engine.crypto.revoke_key(&signer_fpr).unwrap();

    let sender = identity("bob");
    let sender_key: IdentityKey = (sender.user_id, sender.address.clone());
    let command_list = wire::KeyResetCommandList::new(vec![]);

    let result = engine
        .receive_key_reset(&signer_fpr, &sender_key, &command_list, &[])
        .await;
    assert!(matches!(result, Err(KeyResetError::SignerRevoked)));
}

#[tokio::test]
async fn receive_applies_a_peer_key_reset_once_the_old_key_is_revoked() {
    let engine = engine().await;
    let peer = identity("bob");
    let old_fpr = engine.crypto.seed_keypair(false);
    engine.crypto.revoke_key(&old_fpr).unwrap();
    let signer_fpr = engine.crypto.seed_keypair(true);

    let mut tx = engine.store.begin().await.unwrap();
    engine.store.upsert_identity(&mut tx, peer.clone()).await.unwrap();
    engine
        .store
        .set_trust(&mut tx, peer.user_id, &old_fpr, TrustLevel::new(CommType::PepUnconfirmed))
        .await
        .unwrap();
    engine.store.commit(tx).await.unwrap();

    let new_fpr = Fingerprint::new("aaaaaaaaaaaaaaaa");
    let material = engine.crypto.export_public_key_material(&new_fpr).unwrap();
    let command = wire::KeyResetCommand {
        identity: wire::WireIdentity {
            user_id: peer.user_id,
            address: peer.address.clone(),
            fingerprint: Some(old_fpr.as_str().to_string()),
            display_name: None,
        },
        new_fpr: new_fpr.as_str().as_bytes().to_vec(),
    };
    let command_list = wire::KeyResetCommandList::new(vec![command]);
    let sender_key: IdentityKey = (peer.user_id, peer.address.clone());

    let outcome = engine
        .receive_key_reset(&signer_fpr, &sender_key, &command_list, &[material])
        .await
        .unwrap();
    assert_eq!(outcome, crate::Outcome::Processed);

    let default = engine.store.identity_default_key(&sender_key).await.unwrap();
    assert_eq!(default, Some(new_fpr));
}

#[tokio::test]
async fn receive_rejects_reset_for_a_key_we_never_associated_with_the_sender() {
    let engine = engine().await;
    let peer = identity("eve");
    let old_fpr = engine.crypto.seed_keypair(false);
    engine.crypto.revoke_key(&old_fpr).unwrap();
    let signer_fpr = engine.crypto.seed_keypair(true);

    let mut tx = engine.store.begin().await.unwrap();
    engine.store.upsert_identity(&mut tx, peer.clone()).await.unwrap();
    engine.store.commit(tx).await.unwrap(); // no trust row recorded for old_fpr

    let new_fpr = Fingerprint::new("bbbbbbbbbbbbbbbb");
    let material = engine.crypto.export_public_key_material(&new_fpr).unwrap();
    let command = wire::KeyResetCommand {
        identity: wire::WireIdentity {
            user_id: peer.user_id,
            address: peer.address.clone(),
            fingerprint: Some(old_fpr.as_str().to_string()),
            display_name: None,
        },
        new_fpr: new_fpr.as_str().as_bytes().to_vec(),
    };
    let command_list = wire::KeyResetCommandList::new(vec![command]);
    let sender_key: IdentityKey = (peer.user_id, peer.address.clone());

    let result = engine
        .receive_key_reset(&signer_fpr, &sender_key, &command_list, &[material])
        .await;
    assert!(matches!(result, Err(KeyResetError::UnknownOldKey)));
}
