//! Server configuration: a `serde`-deserializable struct loadable from TOML,
//! overlaid by a thin `clap` CLI surface, in the style of the teacher's
//! `Args` struct in `main.rs`.

use std::collections::HashMap;

use oscar_core::rate_limit::{ClassId, RateClassParams};
use serde::{Deserialize, Serialize};

/// Per-service advertised host:port, returned to clients in the
/// reconnect-host TLV so they can reach the next hop through an operator's
/// NAT/terminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAddr {
    /// Local bind address, e.g. `"0.0.0.0:5190"`.
    pub bind: String,
    /// Advertised host:port handed to clients, e.g. `"aim.example.com:5190"`.
    pub advertise: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_auth_addr() -> ServiceAddr {
    ServiceAddr { bind: "0.0.0.0:5190".into(), advertise: "127.0.0.1:5190".into() }
}

fn default_bos_addr() -> ServiceAddr {
    ServiceAddr { bind: "0.0.0.0:5191".into(), advertise: "127.0.0.1:5191".into() }
}

fn default_chat_addr() -> ServiceAddr {
    ServiceAddr { bind: "0.0.0.0:5192".into(), advertise: "127.0.0.1:5192".into() }
}

fn default_chat_nav_addr() -> ServiceAddr {
    ServiceAddr { bind: "0.0.0.0:5193".into(), advertise: "127.0.0.1:5193".into() }
}

fn default_alert_addr() -> ServiceAddr {
    ServiceAddr { bind: "0.0.0.0:5194".into(), advertise: "127.0.0.1:5194".into() }
}

fn default_bart_addr() -> ServiceAddr {
    ServiceAddr { bind: "0.0.0.0:5195".into(), advertise: "127.0.0.1:5195".into() }
}

fn default_cookie_ttl_secs() -> u64 {
    oscar_core::cookie::DEFAULT_TTL_SECS
}

/// The server's full runtime configuration: log level, per-service advertised
/// addresses, storage connection string (opaque), HMAC secret, rate-limit
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `trace`/`debug`/`info`/`warn`/`error`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Auth service listener.
    #[serde(default = "default_auth_addr")]
    pub auth_addr: ServiceAddr,
    /// BOS service listener.
    #[serde(default = "default_bos_addr")]
    pub bos_addr: ServiceAddr,
    /// Chat service listener.
    #[serde(default = "default_chat_addr")]
    pub chat_addr: ServiceAddr,
    /// Chat-nav service listener.
    #[serde(default = "default_chat_nav_addr")]
    pub chat_nav_addr: ServiceAddr,
    /// Alert service listener.
    #[serde(default = "default_alert_addr")]
    pub alert_addr: ServiceAddr,
    /// BART service listener.
    #[serde(default = "default_bart_addr")]
    pub bart_addr: ServiceAddr,

    /// Opaque connection string passed through to the storage layer;
    /// never parsed by the core.
    #[serde(default)]
    pub db_connection_string: String,

    /// Server cookie HMAC secret. Must be kept out of version control in
    /// real deployments; the default is for local development only.
    #[serde(default = "default_hmac_secret")]
    pub hmac_secret: String,

    /// Cookie TTL override, in seconds.
    #[serde(default = "default_cookie_ttl_secs")]
    pub cookie_ttl_secs: u64,

    /// Rate-limit class parameter overrides, one entry per
    /// `(food_group, sub_group)` pair. Classes not listed here use the
    /// built-in defaults.
    #[serde(default)]
    pub rate_classes: Vec<RateClassOverride>,
}

fn default_hmac_secret() -> String {
    "change-me-in-production".to_string()
}

/// TOML-friendly mirror of [`RateClassParams`] (serde can't derive directly
/// on the oscar-core struct without pulling serde into that crate's public
/// API for a config-only concern), plus the `(food_group, sub_group)` this
/// override applies to — expressed as an array of tables rather than a
/// map, since TOML table keys must be strings and rate classes are keyed by
/// a pair of integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateClassOverride {
    /// The SNAC food group this override applies to.
    pub food_group: u16,
    /// The SNAC sub group this override applies to.
    pub sub_group: u16,
    /// See [`RateClassParams::window`].
    pub window: u32,
    /// See [`RateClassParams::clear_level`].
    pub clear_level: u32,
    /// See [`RateClassParams::alert_level`].
    pub alert_level: u32,
    /// See [`RateClassParams::limit_level`].
    pub limit_level: u32,
    /// See [`RateClassParams::disconnect_level`].
    pub disconnect_level: u32,
    /// See [`RateClassParams::max_level`].
    pub max_level: u32,
    /// See [`RateClassParams::critical`].
    #[serde(default)]
    pub critical: bool,
}

impl From<&RateClassOverride> for RateClassParams {
    fn from(o: &RateClassOverride) -> Self {
        Self {
            window: o.window,
            clear_level: o.clear_level,
            alert_level: o.alert_level,
            limit_level: o.limit_level,
            disconnect_level: o.disconnect_level,
            max_level: o.max_level,
            critical: o.critical,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auth_addr: default_auth_addr(),
            bos_addr: default_bos_addr(),
            chat_addr: default_chat_addr(),
            chat_nav_addr: default_chat_nav_addr(),
            alert_addr: default_alert_addr(),
            bart_addr: default_bart_addr(),
            db_connection_string: String::new(),
            hmac_secret: default_hmac_secret(),
            cookie_ttl_secs: default_cookie_ttl_secs(),
            rate_classes: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a message describing the parse failure.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid config: {e}"))
    }

    /// This config's rate-class overrides, converted to the core's type.
    #[must_use]
    pub fn rate_class_params(&self) -> HashMap<ClassId, RateClassParams> {
        self.rate_classes.iter().map(|o| ((o.food_group, o.sub_group), o.into())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let config = ServerConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cookie_ttl_secs, oscar_core::cookie::DEFAULT_TTL_SECS);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = ServerConfig::from_toml(r#"log_level = "debug""#).expect("parse");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.bos_addr.bind, "0.0.0.0:5191");
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(ServerConfig::from_toml("not valid = = toml").is_err());
    }

    #[test]
    fn rate_class_override_converts_to_core_params() {
        let mut config = ServerConfig::default();
        config.rate_classes.push(RateClassOverride {
            food_group: 4,
            sub_group: 1,
            window: 5,
            clear_level: 1,
            alert_level: 2,
            limit_level: 3,
            disconnect_level: 4,
            max_level: 5,
            critical: true,
        });
        let params = config.rate_class_params();
        assert!(params.get(&(4, 1)).unwrap().critical);
    }
}
