//! Turns a plan file and CLI overrides into a validated, immutable
//! [`Settings`] at startup. Parallels `fl_aggregator::settings`; the
//! collaborator additionally needs its own `collaborator_id` and the
//! local paths the trainer reads/writes.

use std::{
    fmt,
    path::{Path, PathBuf},
};

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
    /// This collaborator's identifier; matched against `plan.participants`
    /// by whichever process assigns identities (out of this core's scope).
    #[validate(length(min = 1))]
    pub collaborator_id: String,
    /// Local path the trainer reads its input model from.
    #[serde(default = "Settings::default_model_in")]
    pub model_in: PathBuf,
    /// Local path the trainer writes its output model to.
    #[serde(default = "Settings::default_model_out")]
    pub model_out: PathBuf,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    fn default_model_in() -> PathBuf {
        PathBuf::from("model_in.bin")
    }

    fn default_model_out() -> PathBuf {
        PathBuf::from("model_out.bin")
    }

    /// Loads and validates [`Settings`] from a plan file.
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
pub struct LogSettings {
    #[serde(deserialize_with = "deserialize_env_filter", default = "default_filter")]
    pub filter: EnvFilter,
}

fn default_filter() -> EnvFilter {
    EnvFilter::new("fl_collaborator=info,fl_core=info")
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
