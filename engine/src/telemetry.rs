// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A minimal tracing setup for embedders that don't already run their own
//! subscriber. Unlike the teacher's server-side telemetry, there is no
//! bunyan/JSON layer here — a library has no log shipper downstream of it,
//! only whatever terminal or test harness the host process already has.

use tracing::subscriber::set_global_default;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `default_filter` (e.g. `"trustcore_engine=info"`) when the
/// environment variable isn't set. Safe to call at most once per process;
/// a second call's error is swallowed, since tests that each construct an
/// engine would otherwise panic on the second `#[tokio::test]`.
pub fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = fmt::Subscriber::builder().with_env_filter(env_filter).finish();
    let _ = set_global_default(subscriber);
}
