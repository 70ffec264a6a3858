// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Runtime configuration for the two engines. Unlike the teacher's server
//! configuration, a missing file is not an error here — a library embedded
//! into a host application should work with sane defaults out of the box.

use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use trustcore_common::identifiers::Rating;

/// `reliable` is the floor below which an inbound distribution command is
/// dropped before either engine ever sees it — see
/// [`Rating::MINIMUM_FOR_DISTRIBUTION`].
fn default_min_rating() -> Rating {
    Rating::MINIMUM_FOR_DISTRIBUTION
}

fn default_grouped_key_reset_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// The minimum [`Rating`] an inbound distribution command's sender
    /// must clear before it reaches the Group Engine or Key-Reset Engine.
    #[serde(default = "default_min_rating")]
    pub min_rating: Rating,
    /// Whether an own key reset on a device-grouped identity fans out to
    /// the rest of the device group (§4.2.a) rather than being rejected.
    #[serde(default = "default_grouped_key_reset_enabled")]
    pub grouped_key_reset_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_rating: default_min_rating(),
            grouped_key_reset_enabled: default_grouped_key_reset_enabled(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional YAML file at `path`, layered
    /// under environment variables prefixed `TRUSTCORE_` (`_` as the
    /// nesting separator, e.g. `TRUSTCORE_MIN_RATING=trusted`). A missing
    /// file is not an error: the file layer is simply skipped and
    /// defaults (plus any env overrides) apply.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("TRUSTCORE").separator("_"));
        builder.build()?.try_deserialize()
    }

    /// Load configuration from an in-memory YAML string, for tests and
    /// embedders that keep their configuration outside the filesystem.
    pub fn load_from_str(yaml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }
}
