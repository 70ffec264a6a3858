// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The managed-group and key-reset protocol core: a trust store, a Group
//! Engine, a Key-Reset Engine and the inbound dispatcher that routes
//! decoded wire commands to whichever of the two a message belongs to.
//!
//! Everything this crate calls out to — the crypto backend, the outbound
//! transport, peer rating — is a trait in [`trustcore_common`], so the
//! engines here never depend on a concrete implementation of any of them.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod groups;
pub mod key_reset;
pub mod outbound;
pub mod store;
pub mod telemetry;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};

/// What happened to an inbound command after [`dispatch::dispatch`] routed
/// it. `Ignored` is not a failure — a stale or not-for-us message is
/// ordinary protocol traffic, not something the caller needs to handle as
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    Ignored,
}
