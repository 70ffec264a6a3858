// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Identity, trust and capability types shared by the Group Engine and the
//! Key-Reset Engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{Database, Decode, Encode, Type, encode::IsNull, error::BoxDynError};
use uuid::Uuid;

/// The local clustering key for an identity. Distinct identities that the
/// Peer Evaluator has determined belong to the same real-world party share a
/// `UserId`; the `Address` is what travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<DB: Database> Type<DB> for UserId
where
    Uuid: Type<DB>,
{
    fn type_info() -> DB::TypeInfo {
        Uuid::type_info()
    }
}

impl<'q, DB: Database> Encode<'q, DB> for UserId
where
    Uuid: Encode<'q, DB>,
{
    fn encode_by_ref(&self, buf: &mut DB::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
        self.0.encode_by_ref(buf)
    }
}

impl<'r, DB: Database> Decode<'r, DB> for UserId
where
    Uuid: Decode<'r, DB>,
{
    fn decode(value: DB::ValueRef<'r>) -> Result<Self, BoxDynError> {
        Ok(Self(Uuid::decode(value)?))
    }
}

/// The stable external handle for an identity (an email-like address, a
/// user-handle, whatever the Transport resolves against). Opaque to this
/// crate beyond equality and ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<DB: Database> Type<DB> for Address
where
    String: Type<DB>,
{
    fn type_info() -> DB::TypeInfo {
        String::type_info()
    }
}

impl<'q, DB: Database> Encode<'q, DB> for Address
where
    String: Encode<'q, DB>,
{
    fn encode_by_ref(&self, buf: &mut DB::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
        self.0.encode_by_ref(buf)
    }
}

impl<'r, DB: Database> Decode<'r, DB> for Address
where
    String: Decode<'r, DB>,
{
    fn decode(value: DB::ValueRef<'r>) -> Result<Self, BoxDynError> {
        Ok(Self(String::decode(value)?))
    }
}

/// A key fingerprint, as returned by the Crypto Provider. Stored and
/// compared as lowercase hex; never interpreted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<DB: Database> Type<DB> for Fingerprint
where
    String: Type<DB>,
{
    fn type_info() -> DB::TypeInfo {
        String::type_info()
    }
}

impl<'q, DB: Database> Encode<'q, DB> for Fingerprint
where
    String: Encode<'q, DB>,
{
    fn encode_by_ref(&self, buf: &mut DB::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
        self.0.encode_by_ref(buf)
    }
}

impl<'r, DB: Database> Decode<'r, DB> for Fingerprint
where
    String: Decode<'r, DB>,
{
    fn decode(value: DB::ValueRef<'r>) -> Result<Self, BoxDynError> {
        Ok(Self(String::decode(value)?))
    }
}

/// Capability flags carried on an [`Identity`] row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The local device holds the private key for this identity.
    pub own: bool,
    /// This identity represents a group; its private key is shared with
    /// every invited member.
    pub group_identity: bool,
    /// This identity is one device among several sharing one own key.
    pub device_group: bool,
    /// This identity must never be offered for TOFU/sync purposes.
    pub not_for_sync: bool,
}

/// The ordinal trust/confidence measure attached to a key.
/// Ordering is significant: `Ord` derives the comparisons the engines rely
/// on (`>= StrongUnconfirmed`, `>= Pep`, downgrade checks, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommType {
    Unknown,
    KeyNotFound,
    KeyExpired,
    KeyRevoked,
    Mistrusted,
    StrongUnconfirmed,
    OpenPgpUnconfirmed,
    PepUnconfirmed,
    Pep,
}

impl CommType {
    /// Whether this comm-type blocks the key from being installed or kept
    /// as a default.
    pub fn is_unusable(self) -> bool {
        matches!(self, CommType::KeyRevoked | CommType::Mistrusted)
    }
}

/// A comm-type plus the independent "confirmed" bit. The bit
/// is never set by arithmetic on a comm-type alone — only a human
/// confirmation action sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLevel {
    pub comm_type: CommType,
    pub confirmed: bool,
}

impl TrustLevel {
    pub const fn new(comm_type: CommType) -> Self {
        Self {
            comm_type,
            confirmed: false,
        }
    }

    pub fn at_least(self, threshold: CommType) -> bool {
        self.comm_type >= threshold
    }
}

/// An identity row: `(user_id, address, key_fingerprint)`
/// plus attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub address: Address,
    pub fingerprint: Option<Fingerprint>,
    pub display_name: Option<String>,
    pub capabilities: Capabilities,
}

impl Identity {
    pub fn new(user_id: UserId, address: Address) -> Self {
        Self {
            user_id,
            address,
            fingerprint: None,
            display_name: None,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn own(&self) -> bool {
        self.capabilities.own
    }

    pub fn is_group_identity(&self) -> bool {
        self.capabilities.group_identity
    }
}

/// The Peer Evaluator's ordinal output ("reliable is
/// the minimum acceptable for processing distribution commands").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    FullyAnonymous,
    Unreliable,
    Reliable,
    Trusted,
}

impl Rating {
    pub const MINIMUM_FOR_DISTRIBUTION: Rating = Rating::Reliable;

    pub fn meets(self, threshold: Rating) -> bool {
        self >= threshold
    }
}
