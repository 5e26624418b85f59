//! Settings module which turns a plan file and CLI overrides into a
//! validated, immutable [`Settings`] at startup.
//!
//! Loading the plan file itself (its YAML syntax, schema evolution,
//! and CLI ergonomics) is out of scope for the aggregation core; this
//! module is the thin ambient glue a runnable binary still needs to
//! get from "a path on disk" to a [`fl_core::Plan`].

use std::{fmt, path::Path};

use config::{Config, ConfigError};
use displaydoc::Display;
use fl_core::Plan;
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Display, Error)]
/// An error related to loading and validation of settings.
pub enum SettingsError {
    /// loading configuration file failed: {0}
    Loading(#[from] ConfigError),
    /// validation failed: {0}
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Validate, Deserialize)]
pub struct Settings {
    #[validate]
    #[serde(flatten)]
    pub plan: Plan,
    #[serde(default)]
    pub log: LogSettings,
    /// Root directory round snapshots are written under. Defaults to
    /// `save/`, matching the filesystem layout in the wire contract.
    #[serde(default = "Settings::default_save_dir")]
    pub save_dir: String,
}

impl Settings {
    fn default_save_dir() -> String {
        "save".to_string()
    }

    /// Loads and validates [`Settings`] from a plan file.
    ///
    /// # Errors
    /// Fails when the file can't be read/parsed, or when validation
    /// fails (e.g. `rounds == 0`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Default, Deserialize)]
/// Defines the way the aggregator's logging is filtered.
pub struct LogSettings {
    /// Tokio tracing filter directive, e.g. `fl_aggregator=debug,info`.
    #[serde(deserialize_with = "deserialize_env_filter", default = "default_filter")]
    pub filter: EnvFilter,
}

fn default_filter() -> EnvFilter {
    EnvFilter::new("fl_aggregator=info,fl_core=info")
}

fn deserialize_env_filter<'de, D>(deserializer: D) -> Result<EnvFilter, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvFilterVisitor;
    impl<'de> Visitor<'de> for EnvFilterVisitor {
        type Value = EnvFilter;
        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a tracing-subscriber EnvFilter directive")
        }
        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            EnvFilter::try_new(value)
                .map_err(|_| de::Error::invalid_value(serde::de::Unexpected::Str(value), &self))
        }
    }
    deserializer.deserialize_str(EnvFilterVisitor)
}

pub fn init_logging(settings: &LogSettings) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(settings.filter.to_string())
        .try_init();
}
