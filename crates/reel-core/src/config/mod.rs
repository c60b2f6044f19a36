//! Client configuration.
//!
//! `ClientConfig` carries the public endpoints a client needs for the relay
//! and metadata lookups plus the sync timing knobs. Values come from a JSON
//! file, from `REEL_*` environment variables, or both (environment wins).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::DEFAULT_RELAY_TABLE;
use crate::util::{http_base_url, normalize_text_option};

const DEFAULT_DEBOUNCE_MS: u64 = 600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POPULAR_TTL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_AVAILABILITY_TTL_SECS: u64 = 24 * 60 * 60;

/// Timing knobs for sync sessions and cached lookups
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncTuning {
    /// Quiet period after the last local edit before pushing
    pub debounce_ms: u64,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub popular_ttl_secs: u64,
    pub availability_ttl_secs: u64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            popular_ttl_secs: DEFAULT_POPULAR_TTL_SECS,
            availability_ttl_secs: DEFAULT_AVAILABILITY_TTL_SECS,
        }
    }
}

impl SyncTuning {
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Poll period, never shorter than one second
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn popular_ttl(&self) -> Duration {
        Duration::from_secs(self.popular_ttl_secs)
    }

    #[must_use]
    pub const fn availability_ttl(&self) -> Duration {
        Duration::from_secs(self.availability_ttl_secs)
    }
}

/// Public client configuration.
///
/// Only safe-to-ship values belong here. User access tokens are handed to
/// the sync engine separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub relay_table: Option<String>,
    #[serde(default)]
    pub metadata_base_url: Option<String>,
    #[serde(default)]
    pub metadata_api_key: Option<String>,
    #[serde(default)]
    pub sync: SyncTuning,
}

impl ClientConfig {
    /// Read configuration from `REEL_*` environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = SyncTuning::default();
        let number = |name: &str, default: u64| -> Result<u64, String> {
            normalize_text_option(lookup(name)).map_or(Ok(default), |raw| {
                raw.parse()
                    .map_err(|_| format!("{name} must be a whole number, got '{raw}'"))
            })
        };

        let config = Self {
            supabase_url: lookup("REEL_SUPABASE_URL"),
            supabase_anon_key: lookup("REEL_SUPABASE_ANON_KEY"),
            relay_table: lookup("REEL_RELAY_TABLE"),
            metadata_base_url: lookup("REEL_METADATA_BASE_URL"),
            metadata_api_key: lookup("REEL_METADATA_API_KEY"),
            sync: SyncTuning {
                debounce_ms: number("REEL_SYNC_DEBOUNCE_MS", defaults.debounce_ms)?,
                poll_interval_secs: number("REEL_SYNC_POLL_SECS", defaults.poll_interval_secs)?,
                request_timeout_secs: number(
                    "REEL_REQUEST_TIMEOUT_SECS",
                    defaults.request_timeout_secs,
                )?,
                popular_ttl_secs: number("REEL_POPULAR_TTL_SECS", defaults.popular_ttl_secs)?,
                availability_ttl_secs: number(
                    "REEL_AVAILABILITY_TTL_SECS",
                    defaults.availability_ttl_secs,
                )?,
            },
        };
        config.normalized()
    }

    /// Layer `overrides` on top of `self`. Set values in `overrides` win;
    /// tuning is taken from `overrides` wherever it differs from the defaults.
    #[must_use]
    pub fn overlay(self, overrides: Self) -> Self {
        let defaults = SyncTuning::default();
        let pick = |value: u64, override_value: u64, default: u64| {
            if override_value == default {
                value
            } else {
                override_value
            }
        };

        Self {
            supabase_url: overrides.supabase_url.or(self.supabase_url),
            supabase_anon_key: overrides.supabase_anon_key.or(self.supabase_anon_key),
            relay_table: overrides.relay_table.or(self.relay_table),
            metadata_base_url: overrides.metadata_base_url.or(self.metadata_base_url),
            metadata_api_key: overrides.metadata_api_key.or(self.metadata_api_key),
            sync: SyncTuning {
                debounce_ms: pick(
                    self.sync.debounce_ms,
                    overrides.sync.debounce_ms,
                    defaults.debounce_ms,
                ),
                poll_interval_secs: pick(
                    self.sync.poll_interval_secs,
                    overrides.sync.poll_interval_secs,
                    defaults.poll_interval_secs,
                ),
                request_timeout_secs: pick(
                    self.sync.request_timeout_secs,
                    overrides.sync.request_timeout_secs,
                    defaults.request_timeout_secs,
                ),
                popular_ttl_secs: pick(
                    self.sync.popular_ttl_secs,
                    overrides.sync.popular_ttl_secs,
                    defaults.popular_ttl_secs,
                ),
                availability_ttl_secs: pick(
                    self.sync.availability_ttl_secs,
                    overrides.sync.availability_ttl_secs,
                    defaults.availability_ttl_secs,
                ),
            },
        }
    }

    /// Trim values, drop empties, and validate URLs
    pub fn normalized(self) -> Result<Self, String> {
        Ok(Self {
            supabase_url: normalize_http_url(self.supabase_url, "supabase_url")?,
            supabase_anon_key: normalize_text_option(self.supabase_anon_key),
            relay_table: normalize_text_option(self.relay_table),
            metadata_base_url: normalize_http_url(self.metadata_base_url, "metadata_base_url")?,
            metadata_api_key: normalize_text_option(self.metadata_api_key),
            sync: self.sync,
        })
    }

    /// Supabase URL and anon key when both are set.
    ///
    /// Returns an error when only one of them is configured.
    pub fn supabase(&self) -> Result<Option<(String, String)>, String> {
        match (
            normalize_text_option(self.supabase_url.clone()),
            normalize_text_option(self.supabase_anon_key.clone()),
        ) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Ok(Some((url, anon_key))),
            (Some(_), None) => Err("supabase_anon_key is required with supabase_url".to_string()),
            (None, Some(_)) => Err("supabase_url is required with supabase_anon_key".to_string()),
        }
    }

    /// Relay table name, falling back to the default table
    #[must_use]
    pub fn relay_table(&self) -> String {
        normalize_text_option(self.relay_table.clone())
            .unwrap_or_else(|| DEFAULT_RELAY_TABLE.to_string())
    }
}

/// Parse a client configuration file.
///
/// Public for testability: callers can exercise parsing without touching disk.
pub fn parse_client_config(payload: &str) -> Result<ClientConfig, String> {
    let config: ClientConfig = serde_json::from_str(payload)
        .map_err(|error| format!("invalid client config JSON: {error}"))?;
    config.normalized()
}

fn normalize_http_url(raw: Option<String>, field: &str) -> Result<Option<String>, String> {
    let Some(value) = normalize_text_option(raw) else {
        return Ok(None);
    };
    http_base_url(&value)
        .map(Some)
        .ok_or_else(|| format!("config field '{field}' must include http:// or https://"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_timings() {
        let tuning = SyncTuning::default();
        assert_eq!(tuning.debounce(), Duration::from_millis(600));
        assert_eq!(tuning.poll_interval(), Duration::from_secs(30));
        assert_eq!(tuning.popular_ttl(), Duration::from_secs(21_600));
        assert_eq!(tuning.availability_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let error = parse_client_config(r#"{ "supabase_url": "https://x.supabase.co", "extra": 1 }"#)
            .unwrap_err();
        assert!(error.contains("unknown field"));
    }

    #[test]
    fn parse_normalizes_values() {
        let config = parse_client_config(
            r#"{
              "supabase_url": " https://x.supabase.co/ ",
              "supabase_anon_key": "  ",
              "sync": { "debounce_ms": 250 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.supabase_url.as_deref(), Some("https://x.supabase.co"));
        assert_eq!(config.supabase_anon_key, None);
        assert_eq!(config.sync.debounce_ms, 250);
        assert_eq!(config.sync.poll_interval_secs, 30);
    }

    #[test]
    fn parse_rejects_urls_without_scheme() {
        let error = parse_client_config(r#"{ "metadata_base_url": "api.example.com" }"#)
            .unwrap_err();
        assert!(error.contains("metadata_base_url"));
    }

    #[test]
    fn env_lookup_reads_values_and_numbers() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("REEL_SUPABASE_URL", "https://x.supabase.co"),
            ("REEL_SUPABASE_ANON_KEY", "anon"),
            ("REEL_SYNC_POLL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(
            config.supabase().unwrap(),
            Some(("https://x.supabase.co".to_string(), "anon".to_string()))
        );
        assert_eq!(config.sync.poll_interval_secs, 5);
        assert_eq!(config.sync.debounce_ms, 600);
        assert_eq!(config.relay_table(), DEFAULT_RELAY_TABLE);
    }

    #[test]
    fn env_lookup_rejects_bad_numbers() {
        let error = ClientConfig::from_lookup(lookup(&[("REEL_SYNC_DEBOUNCE_MS", "soon")]))
            .unwrap_err();
        assert!(error.contains("REEL_SYNC_DEBOUNCE_MS"));
    }

    #[test]
    fn supabase_requires_both_values() {
        let config = ClientConfig {
            supabase_url: Some("https://x.supabase.co".to_string()),
            ..ClientConfig::default()
        };
        assert!(config.supabase().is_err());
        assert_eq!(ClientConfig::default().supabase().unwrap(), None);
    }

    #[test]
    fn overlay_prefers_overrides() {
        let file = ClientConfig {
            supabase_url: Some("https://file.supabase.co".to_string()),
            metadata_api_key: Some("file-key".to_string()),
            sync: SyncTuning {
                debounce_ms: 250,
                ..SyncTuning::default()
            },
            ..ClientConfig::default()
        };
        let env = ClientConfig {
            supabase_url: Some("https://env.supabase.co".to_string()),
            sync: SyncTuning {
                poll_interval_secs: 10,
                ..SyncTuning::default()
            },
            ..ClientConfig::default()
        };

        let merged = file.overlay(env);

        assert_eq!(merged.supabase_url.as_deref(), Some("https://env.supabase.co"));
        assert_eq!(merged.metadata_api_key.as_deref(), Some("file-key"));
        assert_eq!(merged.sync.debounce_ms, 250);
        assert_eq!(merged.sync.poll_interval_secs, 10);
    }
}
