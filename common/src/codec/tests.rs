// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use uuid::Uuid;

use super::*;
use crate::identifiers::{Address, UserId};

fn sample_identity(name: &str) -> wire::WireIdentity {
    wire::WireIdentity {
        user_id: UserId(Uuid::new_v4()),
        address: Address::new(format!("{name}@example.org")),
        fingerprint: Some("deadbeef".to_string()),
        display_name: Some(name.to_string()),
    }
}

#[test]
fn roundtrip_group_create() {
    let command = Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupCreate(
        wire::GroupCreate {
            group_identity: sample_identity("group"),
            manager: sample_identity("manager"),
        },
    ));
    let bytes = encode_command(&command).unwrap();
    let decoded: Distribution = decode_command(&bytes).unwrap();
    assert_eq!(command, decoded);
}

#[test]
fn roundtrip_key_reset_list() {
    let command = Distribution::KeyReset(wire::KeyResetCommandList::new(vec![
        wire::KeyResetCommand {
            identity: sample_identity("alice"),
            new_fpr: b"new-fingerprint-bytes".to_vec(),
        },
    ]));
    let bytes = encode_command(&command).unwrap();
    let decoded: Distribution = decode_command(&bytes).unwrap();
    assert_eq!(command, decoded);
}

#[test]
fn decode_rejects_unknown_major_version() {
    let command = Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupAdopted(
        wire::GroupAdopted {
            group_identity: sample_identity("group"),
            member: sample_identity("member"),
        },
    ));
    let mut bytes = encode_command(&command).unwrap();
    bytes[0] = 99;
    let result: Result<Distribution, Error> = decode_command(&bytes);
    assert!(matches!(result, Err(Error::UnknownMajorVersion(99))));
}

#[test]
fn decode_accepts_unknown_minor_version() {
    let command = Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupAdopted(
        wire::GroupAdopted {
            group_identity: sample_identity("group"),
            member: sample_identity("member"),
        },
    ));
    let mut bytes = encode_command(&command).unwrap();
    // A future minor revision within the same major is still decodable.
    bytes[1] = 7;
    let decoded: Distribution = decode_command(&bytes).unwrap();
    assert_eq!(command, decoded);
}

#[test]
fn decode_empty_slice_is_an_error_not_a_panic() {
    let result: Result<Distribution, Error> = decode_command(&[]);
    assert!(matches!(result, Err(Error::EmptyInputSlice)));
}

#[test]
fn decode_of_corrupted_payload_never_yields_a_partial_value() {
    let command = Distribution::KeyReset(wire::KeyResetCommandList::new(vec![
        wire::KeyResetCommand {
            identity: sample_identity("alice"),
            new_fpr: b"fpr".to_vec(),
        },
    ]));
    let mut bytes = encode_command(&command).unwrap();
    let len = bytes.len();
    bytes.truncate(len - 3);
    let result: Result<Distribution, Error> = decode_command(&bytes);
    assert!(result.is_err());
}

#[test]
fn a_fixed_wire_identity_matches_its_recorded_snapshot() {
    // A deterministic sample (nil UUID, fixed strings) round-tripped through
    // the codec, then pinned with insta so an accidental field reorder or
    // rename in `WireIdentity` shows up as a snapshot diff instead of
    // silently changing the wire form.
    let command = Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupAdopted(
        wire::GroupAdopted {
            group_identity: wire::WireIdentity {
                user_id: UserId(Uuid::nil()),
                address: Address::new("alice@example.org"),
                fingerprint: Some("aaaa".to_string()),
                display_name: None,
            },
            member: sample_identity("member"),
        },
    ));
    let bytes = encode_command(&command).unwrap();
    let decoded: Distribution = decode_command(&bytes).unwrap();
    let Distribution::ManagedGroup(wire::ManagedGroupCommand::GroupAdopted(adopted)) = decoded else {
        panic!("expected GroupAdopted");
    };
    insta::assert_debug_snapshot!(adopted.group_identity, @r###"
    WireIdentity {
        user_id: UserId(
            00000000-0000-0000-0000-000000000000,
        ),
        address: Address(
            "alice@example.org",
        ),
        fingerprint: Some(
            "aaaa",
        ),
        display_name: None,
    }
    "###);
}

#[test]
fn encoded_form_starts_with_the_current_version_header() {
    let command = Distribution::KeyReset(wire::KeyResetCommandList::new(vec![
        wire::KeyResetCommand {
            identity: wire::WireIdentity {
                user_id: UserId(Uuid::nil()),
                address: Address::new("alice@example.org"),
                fingerprint: Some("aaaa".to_string()),
                display_name: None,
            },
            new_fpr: b"bbbb".to_vec(),
        },
    ]));
    let bytes = encode_command(&command).unwrap();
    assert_eq!(
        &bytes[..2],
        &[DistributionCodec::CURRENT.major(), DistributionCodec::CURRENT.minor()]
    );
}
