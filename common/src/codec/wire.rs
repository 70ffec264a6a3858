// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wire representations for the commands the Group Engine and Key-Reset
//! Engine exchange. The codec is oblivious to transport
//! framing: these structs carry only the semantic fields.

use serde::{Deserialize, Serialize};

use crate::identifiers::{Address, UserId};

/// The `{address, key-fingerprint, user_id, display_name}` tuple identities are carried as on the wire. Distinct from
/// [`crate::identifiers::Identity`], which also carries capability flags
/// that never travel on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireIdentity {
    pub user_id: UserId,
    pub address: Address,
    /// Lowercase hex, or absent if the sender has no key for this identity.
    pub fingerprint: Option<String>,
    pub display_name: Option<String>,
}

/// "I, the manager, create this group; join if you wish." Carries the
/// group private key as a binary attachment out-of-band;
/// the payload itself only names the two identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCreate {
    pub group_identity: WireIdentity,
    pub manager: WireIdentity,
}

/// "I accept membership." No key attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAdopted {
    pub group_identity: WireIdentity,
    pub member: WireIdentity,
}

/// "This group is ended."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDissolve {
    pub group_identity: WireIdentity,
    pub manager: WireIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagedGroupCommand {
    GroupCreate(GroupCreate),
    GroupAdopted(GroupAdopted),
    GroupDissolve(GroupDissolve),
}

/// One entry in a `keyreset` command list:
/// `{identity, new_fpr}`. `new_fpr` travels as an octet string, not a
/// parsed fingerprint type, since the codec must not interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResetCommand {
    pub identity: WireIdentity,
    #[serde(with = "serde_bytes_octet_string")]
    pub new_fpr: Vec<u8>,
}

mod serde_bytes_octet_string {
    use serde::{Deserializer, Serializer, de::Deserialize};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(d)
    }
}

/// `{version major, version minor, command-list}`. This is
/// the keyreset choice's own version, independent of the outer codec
/// envelope version in `codec::mod` — a key-reset command list can
/// outlive the codec format it happens to be wrapped in today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResetCommandList {
    pub version_major: u8,
    pub version_minor: u8,
    pub commands: Vec<KeyResetCommand>,
}

impl KeyResetCommandList {
    pub const CURRENT_MAJOR: u8 = 1;
    pub const CURRENT_MINOR: u8 = 0;

    pub fn new(commands: Vec<KeyResetCommand>) -> Self {
        Self {
            version_major: Self::CURRENT_MAJOR,
            version_minor: Self::CURRENT_MINOR,
            commands,
        }
    }
}

/// The one envelope type `Distribution` carries: either a managed-group
/// choice or a keyreset choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    ManagedGroup(ManagedGroupCommand),
    KeyReset(KeyResetCommandList),
}
