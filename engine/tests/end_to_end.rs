// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end scenarios that round-trip through the wire codec and the
//! [`trustcore_engine::dispatch::dispatch`] demultiplexer between two
//! independent devices, rather than calling engine methods directly — the
//! unit tests colocated with each engine already cover the state machines
//! themselves; these prove the encode/decode and routing layer between
//! devices works too.

use trustcore_common::codec::{self, wire};
use trustcore_common::crypto::CryptoProvider;
use trustcore_common::identifiers::{Address, CommType, Fingerprint, Identity, Rating, TrustLevel, UserId};
use trustcore_common::test_support::{MockCryptoProvider, MockPeerEvaluator, MockTransport};
use trustcore_engine::EngineResult;
use trustcore_engine::Outcome;
use trustcore_engine::dispatch::{InboundEnvelope, dispatch};
use trustcore_engine::groups::GroupEngine;
use trustcore_engine::key_reset::{KeyResetEngine, ResetIdentity};
use trustcore_engine::store::{IdentityKey, MemoryStore, Store};

type TestGroupEngine = GroupEngine<MemoryStore, MockCryptoProvider, MockTransport, MockPeerEvaluator>;
type TestKeyResetEngine = KeyResetEngine<MemoryStore, MockCryptoProvider, MockTransport, MockPeerEvaluator>;

fn identity(name: &str) -> Identity {
    Identity::new(UserId::random(), Address::new(format!("{name}@example.org")))
}

fn wire_identity(identity: &Identity) -> wire::WireIdentity {
    wire::WireIdentity {
        user_id: identity.user_id,
        address: identity.address.clone(),
        fingerprint: identity.fingerprint.as_ref().map(|f| f.as_str().to_string()),
        display_name: identity.display_name.clone(),
    }
}

/// A device under test: one store/crypto/transport set, shared between
/// the Group Engine and the Key-Reset Engine the way a real host process
/// would wire a single dispatcher up, with handles kept for assertions.
struct Device {
    store: MemoryStore,
    crypto: MockCryptoProvider,
    transport: MockTransport,
    groups: TestGroupEngine,
    key_reset: TestKeyResetEngine,
}

impl Device {
    fn new() -> Self {
        let store = MemoryStore::new();
        let crypto = MockCryptoProvider::new();
        let transport = MockTransport::new();
        let peers = MockPeerEvaluator::new();
        let groups = GroupEngine::new(store.clone(), crypto.clone(), transport.clone(), peers.clone());
        let key_reset = KeyResetEngine::new(store.clone(), crypto.clone(), transport.clone(), peers);
        Self {
            store,
            crypto,
            transport,
            groups,
            key_reset,
        }
    }

    async fn dispatch(&self, envelope: &InboundEnvelope<'_>) -> EngineResult<Outcome> {
        dispatch(&self.groups, &self.key_reset, envelope).await
    }

    async fn set_own_user_id(&self, user_id: UserId) {
        let mut tx = self.store.begin().await.unwrap();
        self.store.set_default_own_user_id(&mut tx, user_id).await.unwrap();
        self.store.commit(tx).await.unwrap();
    }
}

#[tokio::test]
async fn create_invite_join_round_trips_through_the_wire_codec() {
    let manager_device = Device::new();
    let manager = identity("manager");
    let group_identity = identity("group");
    let group = manager_device
        .groups
        .create_group(group_identity, manager.clone(), vec![])
        .await
        .unwrap();

    let member = identity("member");
    manager_device
        .groups
        .group_invite_member(&group, &manager, &member)
        .await
        .unwrap();
    assert_eq!(manager_device.transport.sent_messages().len(), 1);

    // The member's own device decodes a groupCreate naming the manager's
    // real signing key and applies it independently.
    let member_device = Device::new();
    member_device.set_own_user_id(member.user_id).await;

    let manager_fpr = member_device.crypto.seed_keypair(true);
    let create = wire::GroupCreate {
        group_identity: wire_identity(&group),
        manager: wire::WireIdentity {
            fingerprint: Some(manager_fpr.as_str().to_string()),
            ..wire_identity(&manager)
        },
    };
    let payload = codec::encode_command(&codec::Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupCreate(
        create,
    )))
    .unwrap();

    let envelope = InboundEnvelope {
        signer_fpr: manager_fpr,
        sender: (manager.user_id, manager.address.clone()),
        own_address: member.address.clone(),
        payload: &payload,
        key_materials: vec![],
        rating: Rating::Reliable,
    };
    let outcome = member_device.dispatch(&envelope).await.unwrap();
    assert_eq!(outcome, Outcome::Processed);
    assert!(
        member_device
            .store
            .exists_group(&(group.user_id, group.address.clone()))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn adoption_is_dispatched_to_the_group_engine() {
    let manager_device = Device::new();
    let manager = identity("manager");
    let group_identity = identity("group");
    let group = manager_device
        .groups
        .create_group(group_identity, manager.clone(), vec![])
        .await
        .unwrap();

    let member = identity("member");
    manager_device
        .groups
        .group_invite_member(&group, &manager, &member)
        .await
        .unwrap();

    let member_fpr = manager_device.crypto.seed_keypair(true);
    let adopted = wire::GroupAdopted {
        group_identity: wire_identity(&group),
        member: wire::WireIdentity {
            fingerprint: Some(member_fpr.as_str().to_string()),
            ..wire_identity(&member)
        },
    };
    let payload = codec::encode_command(&codec::Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupAdopted(
        adopted,
    )))
    .unwrap();

    let envelope = InboundEnvelope {
        signer_fpr: member_fpr,
        sender: (member.user_id, member.address.clone()),
        own_address: manager.address.clone(),
        payload: &payload,
        key_materials: vec![],
        rating: Rating::Reliable,
    };
    let outcome = manager_device.dispatch(&envelope).await.unwrap();
    assert_eq!(outcome, Outcome::Processed);
    assert!(
        manager_device
            .store
            .is_active_member(
                &(group.user_id, group.address.clone()),
                &(member.user_id, member.address.clone()),
            )
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn a_forged_adoption_signed_by_the_wrong_key_is_rejected_by_dispatch() {
    let manager_device = Device::new();
    let manager = identity("manager");
    let group_identity = identity("group");
    let group = manager_device
        .groups
        .create_group(group_identity, manager.clone(), vec![])
        .await
        .unwrap();

    let member = identity("member");
    manager_device
        .groups
        .group_invite_member(&group, &manager, &member)
        .await
        .unwrap();

    let real_fpr = manager_device.crypto.seed_keypair(true);
    let attacker_fpr = manager_device.crypto.seed_keypair(true);

    let adopted = wire::GroupAdopted {
        group_identity: wire_identity(&group),
        member: wire::WireIdentity {
            fingerprint: Some(real_fpr.as_str().to_string()),
            ..wire_identity(&member)
        },
    };
    let payload = codec::encode_command(&codec::Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupAdopted(
        adopted,
    )))
    .unwrap();

    // First sighting establishes real_fpr as the member's key via TOFU.
    let establish = InboundEnvelope {
        signer_fpr: real_fpr.clone(),
        sender: (member.user_id, member.address.clone()),
        own_address: manager.address.clone(),
        payload: &payload,
        key_materials: vec![],
        rating: Rating::Reliable,
    };
    manager_device.dispatch(&establish).await.unwrap();

    // A second envelope claiming the same identity but signed by a
    // different key must be rejected through dispatch, not just when
    // calling the Group Engine's method directly.
    let forged = InboundEnvelope {
        signer_fpr: attacker_fpr,
        sender: (member.user_id, member.address.clone()),
        own_address: manager.address.clone(),
        payload: &payload,
        key_materials: vec![],
        rating: Rating::Reliable,
    };
    let result = manager_device.dispatch(&forged).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn dissolution_is_dispatched_and_disables_the_group() {
    let manager_device = Device::new();
    let manager = identity("manager");
    let group_identity = identity("group");
    let group = manager_device
        .groups
        .create_group(group_identity, manager.clone(), vec![])
        .await
        .unwrap();

    let manager_fpr = manager_device
        .store
        .identity_default_key(&(manager.user_id, manager.address.clone()))
        .await
        .unwrap();
    assert!(manager_fpr.is_none()); // create_group never assigns the manager a key on its own

    let signer_fpr = manager_device.crypto.seed_keypair(true);
    let mut tx = manager_device.store.begin().await.unwrap();
    manager_device
        .store
        .set_identity_default_key(&mut tx, &(manager.user_id, manager.address.clone()), Some(signer_fpr.clone()))
        .await
        .unwrap();
    manager_device.store.commit(tx).await.unwrap();

    let dissolve = wire::GroupDissolve {
        group_identity: wire_identity(&group),
        manager: wire_identity(&manager),
    };
    let payload = codec::encode_command(&codec::Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupDissolve(
        dissolve,
    )))
    .unwrap();

    let envelope = InboundEnvelope {
        signer_fpr,
        sender: (manager.user_id, manager.address.clone()),
        own_address: manager.address.clone(),
        payload: &payload,
        key_materials: vec![],
        rating: Rating::Reliable,
    };
    let outcome = manager_device.dispatch(&envelope).await.unwrap();
    assert_eq!(outcome, Outcome::Processed);
    assert!(
        !manager_device
            .store
            .is_group_active(&(group.user_id, group.address.clone()))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn grouped_own_key_reset_is_received_and_applied_by_a_sibling_device() {
    let device_a = Device::new();
    let old_fpr = device_a.crypto.seed_keypair(true);
    let mut own_a = identity("alice-laptop");
    own_a.capabilities.own = true;
    own_a.capabilities.device_group = true;
    own_a.fingerprint = Some(old_fpr.clone());
    let key_a: IdentityKey = (own_a.user_id, own_a.address.clone());

    let mut tx = device_a.store.begin().await.unwrap();
    device_a.store.upsert_identity(&mut tx, own_a.clone()).await.unwrap();
    device_a
        .store
        .set_identity_default_key(&mut tx, &key_a, Some(old_fpr.clone()))
        .await
        .unwrap();
    device_a.store.commit(tx).await.unwrap();

    device_a.key_reset.key_reset(Some(&old_fpr), None).await.unwrap();

    let sent = device_a.transport.sent_messages();
    assert_eq!(sent.len(), 1);

    let distribution: codec::Distribution = codec::decode_command(&sent[0].payload).unwrap();
    let command_list = match distribution {
        codec::Distribution::KeyReset(list) => list,
        other => panic!("expected a KeyReset distribution, got {other:?}"),
    };
    let new_fpr = Fingerprint::new(String::from_utf8(command_list.commands[0].new_fpr.clone()).unwrap());

    // The sibling device already trusts alice's signing key at pEp level
    // and has the old key on file — the prerequisites for an own-sender
    // reset to be accepted.
    let device_b = Device::new();
    device_b.set_own_user_id(own_a.user_id).await;
    let signer_fpr = device_b.crypto.seed_keypair(true);

    let mut tx = device_b.store.begin().await.unwrap();
    device_b.store.upsert_identity(&mut tx, own_a.clone()).await.unwrap();
    device_b
        .store
        .set_identity_default_key(&mut tx, &key_a, Some(old_fpr.clone()))
        .await
        .unwrap();
    device_b
        .store
        .set_trust(&mut tx, own_a.user_id, &signer_fpr, TrustLevel::new(CommType::Pep))
        .await
        .unwrap();
    device_b
        .store
        .set_trust(&mut tx, own_a.user_id, &old_fpr, TrustLevel::new(CommType::Pep))
        .await
        .unwrap();
    device_b.store.commit(tx).await.unwrap();

    // The attachment device_b receives is exactly what device_a's own
    // grouped key reset actually transmitted, not independently re-derived.
    let envelope = InboundEnvelope {
        signer_fpr,
        sender: key_a.clone(),
        own_address: own_a.address.clone(),
        payload: &sent[0].payload,
        key_materials: sent[0].attachments.clone(),
        rating: Rating::Reliable,
    };
    let outcome = device_b.dispatch(&envelope).await.unwrap();
    assert_eq!(outcome, Outcome::Processed);

    let new_default = device_b.store.identity_default_key(&key_a).await.unwrap();
    assert_eq!(new_default, Some(new_fpr));
}

#[tokio::test]
async fn peer_key_reset_received_through_dispatch_clears_the_old_default() {
    let own_device = Device::new();
    // Stands in for bob's own device: its export is what actually reaches
    // the wire, rather than a value the receiver fabricates for itself.
    let peer_crypto = MockCryptoProvider::new();
    let peer = identity("bob");
    let old_fpr = Fingerprint::new("cccccccccccccccc");
    let new_fpr = peer_crypto.generate_keypair(&peer.user_id).unwrap();
    let key: IdentityKey = (peer.user_id, peer.address.clone());

    let mut tx = own_device.store.begin().await.unwrap();
    own_device.store.upsert_identity(&mut tx, peer.clone()).await.unwrap();
    own_device
        .store
        .set_identity_default_key(&mut tx, &key, Some(old_fpr.clone()))
        .await
        .unwrap();
    own_device
        .store
        .set_trust(&mut tx, peer.user_id, &old_fpr, TrustLevel::new(CommType::PepUnconfirmed))
        .await
        .unwrap();
    own_device.store.commit(tx).await.unwrap();

    own_device.crypto.revoke_key(&old_fpr).unwrap();
    let signer_fpr = own_device.crypto.seed_keypair(false);

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
    let payload = codec::encode_command(&codec::Distribution::KeyReset(command_list)).unwrap();
    let material = peer_crypto.export_public_key_material(&new_fpr).unwrap();

    let envelope = InboundEnvelope {
        signer_fpr,
        sender: key.clone(),
        own_address: Address::new("me@example.org"),
        payload: &payload,
        key_materials: vec![material],
        rating: Rating::Reliable,
    };
    let outcome = own_device.dispatch(&envelope).await.unwrap();
    assert_eq!(outcome, Outcome::Processed);

    let default = own_device.store.identity_default_key(&key).await.unwrap();
    assert_eq!(default, Some(new_fpr));
}

#[tokio::test]
async fn reset_by_identity_resolves_a_peers_default_key_without_a_fingerprint() {
    let device = Device::new();
    let peer_fpr = device.crypto.seed_keypair(false);
    let mut peer = identity("carol");
    peer.fingerprint = Some(peer_fpr.clone());
    let key: IdentityKey = (peer.user_id, peer.address.clone());

    let mut tx = device.store.begin().await.unwrap();
    device.store.upsert_identity(&mut tx, peer.clone()).await.unwrap();
    device
        .store
        .set_identity_default_key(&mut tx, &key, Some(peer_fpr.clone()))
        .await
        .unwrap();
    device.store.commit(tx).await.unwrap();

    device
        .key_reset
        .key_reset(None, Some(ResetIdentity::Keyed(key.clone())))
        .await
        .unwrap();

    assert_eq!(device.store.identity_default_key(&key).await.unwrap(), None);
}
