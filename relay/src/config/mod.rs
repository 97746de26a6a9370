//! Configuration management
//!
//! Defaults, overlaid by an optional JSON file, overlaid by `BLOCKRELAY_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::auth::provider::google::TOKEN_ENDPOINT;
use crate::blocks::{airtable, gmail, sheets};
use crate::common::paths;

/// Largest accepted token buffer (one day)
pub const MAX_TOKEN_BUFFER_SECS: i64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen_addr: String,
    pub token_endpoint: String,
    /// Safety margin subtracted from token expiry before refreshing
    pub token_buffer_secs: i64,
    pub request_timeout_secs: u64,
    pub default_user_key: String,
    /// Treat bundles without `expiresAt` as expired instead of never-expiring
    pub missing_expiry_is_expired: bool,
    pub sheets_base_url: String,
    pub gmail_base_url: String,
    pub airtable_base_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3001".to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            token_buffer_secs: 300,
            request_timeout_secs: 30,
            default_user_key: "default".to_string(),
            missing_expiry_is_expired: true,
            sheets_base_url: sheets::DEFAULT_BASE_URL.to_string(),
            gmail_base_url: gmail::DEFAULT_BASE_URL.to_string(),
            airtable_base_url: airtable::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from `BLOCKRELAY_CONFIG` (or `~/.blockrelay/config.json`)
    /// and the process environment.
    pub fn load() -> Result<Self, String> {
        let path = std::env::var("BLOCKRELAY_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(paths::default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        info!(
            "Configuration loaded (listen {}, token buffer {}s)",
            config.listen_addr, config.token_buffer_secs
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config {:?}: {}", path, e))
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set_string = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                *target = v;
            }
        };

        set_string(&mut self.listen_addr, "BLOCKRELAY_LISTEN_ADDR");
        set_string(&mut self.token_endpoint, "BLOCKRELAY_TOKEN_ENDPOINT");
        set_string(&mut self.default_user_key, "BLOCKRELAY_DEFAULT_USER_KEY");
        set_string(&mut self.sheets_base_url, "BLOCKRELAY_SHEETS_BASE_URL");
        set_string(&mut self.gmail_base_url, "BLOCKRELAY_GMAIL_BASE_URL");
        set_string(&mut self.airtable_base_url, "BLOCKRELAY_AIRTABLE_BASE_URL");

        if let Some(v) = lookup("BLOCKRELAY_TOKEN_BUFFER_SECS") {
            self.token_buffer_secs = v
                .parse()
                .map_err(|e| format!("Invalid BLOCKRELAY_TOKEN_BUFFER_SECS '{}': {}", v, e))?;
        }
        if let Some(v) = lookup("BLOCKRELAY_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v
                .parse()
                .map_err(|e| format!("Invalid BLOCKRELAY_REQUEST_TIMEOUT_SECS '{}': {}", v, e))?;
        }
        if let Some(v) = lookup("BLOCKRELAY_MISSING_EXPIRY_IS_EXPIRED") {
            self.missing_expiry_is_expired = match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    warn!("Ignoring BLOCKRELAY_MISSING_EXPIRY_IS_EXPIRED='{}'", v);
                    self.missing_expiry_is_expired
                }
            };
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0..=MAX_TOKEN_BUFFER_SECS).contains(&self.token_buffer_secs) {
            return Err(format!(
                "token_buffer_secs must be between 0 and {}",
                MAX_TOKEN_BUFFER_SECS
            ));
        }
        Ok(())
    }

    /// Token buffer as a duration, clamped to the accepted range.
    pub fn token_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_buffer_secs.clamp(0, MAX_TOKEN_BUFFER_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.token_buffer_secs, 300);
        assert!(config.missing_expiry_is_expired);
        assert_eq!(config.airtable_base_url, "https://api.airtable.com/v0");
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("BLOCKRELAY_LISTEN_ADDR", "0.0.0.0:8080"),
            ("BLOCKRELAY_TOKEN_BUFFER_SECS", "60"),
            ("BLOCKRELAY_MISSING_EXPIRY_IS_EXPIRED", "false"),
        ]);
        let mut config = RelayConfig::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.token_buffer_secs, 60);
        assert!(!config.missing_expiry_is_expired);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let vars = env(&[("BLOCKRELAY_REQUEST_TIMEOUT_SECS", "soon")]);
        let mut config = RelayConfig::default();
        assert!(config.apply_env(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_token_buffer_is_bounded() {
        let vars = env(&[("BLOCKRELAY_TOKEN_BUFFER_SECS", "9223372036854775807")]);
        let mut config = RelayConfig::default();
        assert!(config.apply_env(|k| vars.get(k).cloned()).is_err());

        let config = RelayConfig {
            token_buffer_secs: i64::MAX,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.token_buffer(), chrono::Duration::days(1));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: RelayConfig =
            serde_json::from_str(r#"{"default_user_key": "tenant-a"}"#).unwrap();
        assert_eq!(config.default_user_key, "tenant-a");
        assert_eq!(config.request_timeout_secs, 30);
    }
}
