//! Encoder preferences read from a config file and the environment.
//!
//! ```toml
//! [encode]
//! int_base = 16
//! float_form = "e"
//! ```
//!
//! Any field may also be set as `ARI__ENCODE__<FIELD>`, which wins over
//! the file.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::debug;

use crate::ari_text::EncodeOptions;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub encode: EncodeOptions,
}

impl Settings {
    /// Read `path` if it exists (any format the config crate knows by its
    /// extension), then the environment.
    pub fn load(path: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("ARI").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.encode.validate()?;
        debug!("loaded settings {:?}", settings);
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings =
            Config::builder().add_source(File::from_str(text, FileFormat::Toml)).build()?.try_deserialize()?;
        settings.encode.validate()?;
        Ok(settings)
    }
}
