// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared identity, trust, crypto/transport contracts and wire codec for
//! the managed-group and key-reset protocol core.

pub mod codec;
pub mod crypto;
pub mod identifiers;
pub mod transport;

#[cfg(feature = "test_utils")]
pub mod test_support;
