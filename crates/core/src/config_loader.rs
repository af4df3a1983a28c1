use crate::config::AppConfig;
use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Toml, Yaml},
    Figment,
};
use std::path::Path;

/// Environment variable prefix for overrides, e.g. `SIGNAL_TRADE_EXCHANGE__HEDGE_MODE=true`.
pub const ENV_PREFIX: &str = "SIGNAL_TRADE_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config file (YAML unless the extension is `.toml`) merged
    /// with `SIGNAL_TRADE_` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }

        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Figment::new().merge(Toml::file(path)),
            _ => Figment::new().merge(Yaml::file(path)),
        };

        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Parses an in-memory YAML document, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed.
    pub fn from_yaml_str(yaml: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = Figment::new().merge(Yaml::string(yaml)).extract()?;
        Ok(config)
    }
}
