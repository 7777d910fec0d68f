//! Provider configuration.
//!
//! A [`ProviderConfig`] layers explicit options over an environment snapshot.
//! The snapshot is handed in by the caller ([`ProviderConfig::with_env`],
//! [`ProviderConfig::with_process_env`]) or filled from a dotenv file
//! ([`ProviderConfig::load_file`]); lookups never read the process
//! environment on their own.
//!
//! # Example Configuration
//!
//! ```text
//! merchant_id=M1
//! page_id=P1
//! back_url_s=https://shop.example/ok
//! back_url_f=https://shop.example/fail
//! cert_path=/etc/geopay/bog.pem
//! ```

use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;
use crate::params::ParamMap;

/// Option naming a dotenv file loaded when a [`Payment`](crate::Payment) is built.
pub const CONFIG_PATH: &str = "config_path";
/// Option naming the PEM certificate used for callback signatures.
pub const CERT_PATH: &str = "cert_path";
/// Option overriding a provider's gateway URL.
pub const PAYMENT_URL: &str = "payment_url";
/// Option holding the comma-separated callback IP allowlist.
pub const ALLOWED_IPS: &str = "allowed_ips";
/// Basic auth user expected on callbacks.
pub const HTTP_AUTH_USER: &str = "http_auth_user";
/// Basic auth password expected on callbacks.
pub const HTTP_AUTH_PASS: &str = "http_auth_pass";
/// Realm announced when basic auth is challenged.
pub const SHOP_NAME: &str = "shop_name";
/// Directory receiving per-provider daily log files.
pub const LOG_PATH: &str = "log_path";
/// Log level used when `RUST_LOG` is unset.
pub const LOG_LEVEL: &str = "log_level";

/// Explicit provider options with an environment fallback.
///
/// Explicit options always shadow the environment layer.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    options: ParamMap,
    env: HashMap<String, String>,
}

impl ProviderConfig {
    /// Creates an empty configuration with an empty environment layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from explicit options.
    #[must_use]
    pub fn from_options<I, K, V>(options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            options: options.into_iter().collect(),
            env: HashMap::new(),
        }
    }

    /// Replaces the environment layer with the given snapshot.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Snapshots the current process environment into the environment layer.
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env(std::env::vars())
    }

    /// Looks up `name`, first in the explicit options, then in the environment.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.options
            .get(name)
            .or_else(|| self.env.get(name).map(String::as_str))
    }

    /// Looks up `name`, returning `default` when neither layer has it.
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Sets an explicit option.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.insert(name, value);
    }

    /// Explicit options in insertion order.
    #[must_use]
    pub const fn options(&self) -> &ParamMap {
        &self.options
    }

    /// Loads a dotenv file into the environment layer.
    ///
    /// Entries already present in the environment layer are kept, as dotenv
    /// never overrides existing variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigFileNotFound`] if `path` is not a regular file and
    /// [`Error::InvalidConfigFile`] if it cannot be parsed.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ConfigFileNotFound(path.to_path_buf()));
        }
        let invalid = |e: dotenvy::Error| Error::InvalidConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        for item in dotenvy::from_path_iter(path).map_err(invalid)? {
            let (key, value) = item.map_err(invalid)?;
            self.env.entry(key).or_insert(value);
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!(path = %path.display(), "Loaded config file");

        Ok(())
    }
}
