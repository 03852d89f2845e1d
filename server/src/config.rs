use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_BIND: &str = "0.0.0.0:7524";
pub const DEFAULT_DATA_DIR: &str = "data/scripts";
/// The stylesheet directory shipped with this crate.
pub const DEFAULT_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/public");

/// Fallback pair used when `ENV_USER` or `ENV_PASSWORD` is missing.
/// Not a security boundary; every deployment must override both.
pub const FALLBACK_USER: &str = "admin";
pub const FALLBACK_PASSWORD: &str = "123456";

/// The single credential pair accepted by the login endpoint and Basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// True when at least one half came from the fallback pair.
    pub fallback: bool,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            fallback: false,
        }
    }
}

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub static_dir: PathBuf,
    pub cli_template: Option<PathBuf>,
    pub credentials: Credentials,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// Empty values count as unset, so `ENV_USER=` falls back like a missing
    /// variable would.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let bind_raw = get("SCRIPTHUB_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid SCRIPTHUB_BIND address {:?}", bind_raw))?;

        let credentials = match (get("ENV_USER"), get("ENV_PASSWORD")) {
            (Some(username), Some(password)) => Credentials::new(username, password),
            (user, pass) => Credentials {
                username: user.unwrap_or_else(|| FALLBACK_USER.to_string()),
                password: pass.unwrap_or_else(|| FALLBACK_PASSWORD.to_string()),
                fallback: true,
            },
        };

        Ok(Config {
            bind,
            data_dir: get("SCRIPTHUB_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            static_dir: get("SCRIPTHUB_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            cli_template: get("SCRIPTHUB_CLI_TEMPLATE").map(PathBuf::from),
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert!(cfg.cli_template.is_none());
        assert!(cfg.static_dir.join("app.css").is_file());
        assert_eq!(cfg.credentials.username, FALLBACK_USER);
        assert_eq!(cfg.credentials.password, FALLBACK_PASSWORD);
        assert!(cfg.credentials.fallback);
    }

    #[test]
    fn configured_credentials_are_used() {
        let cfg = config_from(&[("ENV_USER", "ops"), ("ENV_PASSWORD", "s3cret")]).unwrap();
        assert_eq!(cfg.credentials, Credentials::new("ops", "s3cret"));
    }

    #[test]
    fn half_configured_credentials_are_flagged() {
        let cfg = config_from(&[("ENV_USER", "ops")]).unwrap();
        assert_eq!(cfg.credentials.username, "ops");
        assert_eq!(cfg.credentials.password, FALLBACK_PASSWORD);
        assert!(cfg.credentials.fallback);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = config_from(&[("ENV_USER", ""), ("ENV_PASSWORD", "")]).unwrap();
        assert!(cfg.credentials.fallback);
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        assert!(config_from(&[("SCRIPTHUB_BIND", "not-an-addr")]).is_err());
    }
}
