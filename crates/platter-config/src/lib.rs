// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ENV_PREFIX: &str = "PLATTER_";

#[derive(Clone, Serialize, Deserialize)]
pub struct DiscogsConfig {
    /// Personal access token. Takes precedence over OAuth credentials.
    pub user_token: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub oauth_token: Option<String>,
    pub oauth_token_secret: Option<String>,
    pub user_agent: Option<String>,
    pub base_url: Option<String>,
    pub request_limit: u32,
    pub request_limit_auth: u32,
    pub request_limit_interval_ms: u64,
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Number of GET responses to keep in memory; unset disables caching.
    pub cache_capacity: Option<u64>,
}

impl Default for DiscogsConfig {
    fn default() -> Self {
        Self {
            user_token: None,
            consumer_key: None,
            consumer_secret: None,
            oauth_token: None,
            oauth_token_secret: None,
            user_agent: None,
            base_url: None,
            request_limit: 25,
            request_limit_auth: 60,
            request_limit_interval_ms: 60_000,
            concurrency: 1,
            timeout_secs: 30,
            cache_capacity: None,
        }
    }
}

impl std::fmt::Debug for DiscogsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscogsConfig")
            .field("user_token", &self.user_token.as_ref().map(|_| "<redacted>"))
            .field("consumer_key", &self.consumer_key)
            .field("oauth_token", &self.oauth_token)
            .field("user_agent", &self.user_agent)
            .field("base_url", &self.base_url)
            .field("request_limit", &self.request_limit)
            .field("request_limit_auth", &self.request_limit_auth)
            .field("request_limit_interval_ms", &self.request_limit_interval_ms)
            .field("concurrency", &self.concurrency)
            .field("timeout_secs", &self.timeout_secs)
            .field("cache_capacity", &self.cache_capacity)
            .finish_non_exhaustive()
    }
}

/// Complete OAuth 1.0a credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: &'a str,
    pub token_secret: &'a str,
}

impl DiscogsConfig {
    pub fn user_token(&self) -> Option<&str> {
        self.user_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// OAuth credentials, only if all four parts are set.
    pub fn oauth(&self) -> Option<OAuthCredentials<'_>> {
        Some(OAuthCredentials {
            consumer_key: self.consumer_key.as_deref()?,
            consumer_secret: self.consumer_secret.as_deref()?,
            token: self.oauth_token.as_deref()?,
            token_secret: self.oauth_token_secret.as_deref()?,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_token().is_some() || self.oauth().is_some()
    }

    pub fn request_limit_interval(&self) -> Duration {
        Duration::from_millis(self.request_limit_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.request_limit == 0 || self.request_limit_auth == 0 {
            bail!("discogs.request_limit and discogs.request_limit_auth must be greater than zero");
        }
        if self.request_limit_interval_ms == 0 {
            bail!("discogs.request_limit_interval_ms must be greater than zero");
        }
        if self.concurrency == 0 {
            bail!("discogs.concurrency must be at least 1");
        }

        for warning in self.warnings() {
            warn!(target: "config", "{}", warning);
        }
        Ok(())
    }

    /// Settings that load fine but are ignored.
    pub fn warnings(&self) -> Vec<&'static str> {
        let oauth_parts = [
            &self.consumer_key,
            &self.consumer_secret,
            &self.oauth_token,
            &self.oauth_token_secret,
        ];
        let set = oauth_parts.iter().filter(|part| part.is_some()).count();

        let mut warnings = Vec::new();
        if set > 0 && set < oauth_parts.len() {
            warnings.push("incomplete OAuth credentials are ignored");
        }
        if self.user_token.is_some() && self.user_token().is_none() {
            warnings.push("blank user token is ignored");
        }
        warnings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub discogs: DiscogsConfig,
    pub telemetry: TelemetryConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: PLATTER_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment.extract()?;
    config.discogs.validate()?;
    info!(
        target: "config",
        authenticated = config.discogs.is_authenticated(),
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = load(None).expect("defaults load");
            assert_eq!(config.discogs.request_limit, 25);
            assert_eq!(config.discogs.request_limit_auth, 60);
            assert_eq!(
                config.discogs.request_limit_interval(),
                Duration::from_secs(60)
            );
            assert_eq!(config.discogs.concurrency, 1);
            assert!(config.discogs.cache_capacity.is_none());
            assert!(!config.discogs.is_authenticated());
            assert_eq!(config.telemetry.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "platter.toml",
                r#"
                    [discogs]
                    user_agent = "crate-digger/2.0"
                    request_limit_auth = 40
                    cache_capacity = 500

                    [telemetry]
                    log_level = "debug"
                "#,
            )?;
            jail.set_env("PLATTER_DISCOGS__USER_TOKEN", "env-token");
            jail.set_env("PLATTER_DISCOGS__REQUEST_LIMIT_AUTH", "30");

            let config = load(Some(Path::new("platter.toml"))).expect("config loads");
            assert_eq!(config.discogs.user_agent.as_deref(), Some("crate-digger/2.0"));
            assert_eq!(config.discogs.request_limit_auth, 30);
            assert_eq!(config.discogs.cache_capacity, Some(500));
            assert_eq!(config.discogs.user_token(), Some("env-token"));
            assert_eq!(config.telemetry.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_oauth_requires_every_part() {
        let mut config = DiscogsConfig {
            consumer_key: Some("key".to_string()),
            consumer_secret: Some("secret".to_string()),
            oauth_token: Some("token".to_string()),
            ..Default::default()
        };
        assert!(config.oauth().is_none());
        assert!(!config.is_authenticated());

        assert_eq!(
            config.warnings(),
            vec!["incomplete OAuth credentials are ignored"]
        );

        config.oauth_token_secret = Some("token-secret".to_string());
        assert!(config.warnings().is_empty());
        let oauth = config.oauth().unwrap();
        assert_eq!(oauth.token_secret, "token-secret");
        assert!(config.is_authenticated());
    }

    #[test]
    fn test_blank_token_is_not_authentication() {
        let config = DiscogsConfig {
            user_token: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.user_token().is_none());
        assert!(!config.is_authenticated());
        assert_eq!(config.warnings(), vec!["blank user token is ignored"]);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("PLATTER_DISCOGS__REQUEST_LIMIT", "0");
            assert!(load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_debug_hides_token() {
        let config = DiscogsConfig {
            user_token: Some("very-secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("very-secret"));
    }
}
