//! Session affinity configuration

use crate::cookie::is_valid_cookie_name;
use crate::error::{Result, StickySessionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Cookie name used when none is configured
pub const DEFAULT_COOKIE_NAME: &str = "_backend";

/// Environment variable overriding the cookie name
pub const ENV_COOKIE_NAME: &str = "STICKY_COOKIE_NAME";

/// Environment variable overriding the cookie secret
pub const ENV_COOKIE_SECRET: &str = "STICKY_COOKIE_SECRET";

/// Validated affinity settings, fixed for the lifetime of the balancer
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityConfig {
    pub cookie_name: String,
    #[serde(skip_serializing)]
    pub secret: String,
}

impl AffinityConfig {
    /// Create a validated configuration
    pub fn new(cookie_name: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let config = Self {
            cookie_name: cookie_name.into(),
            secret: secret.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the cookie name is a valid token and the secret is set
    pub fn validate(&self) -> Result<()> {
        if self.cookie_name.is_empty() {
            return Err(StickySessionError::Configuration(
                "cookie name must not be empty".to_string(),
            ));
        }
        if !is_valid_cookie_name(&self.cookie_name) {
            return Err(StickySessionError::Configuration(format!(
                "invalid cookie name {:?}",
                self.cookie_name
            )));
        }
        if self.secret.is_empty() {
            return Err(StickySessionError::Configuration(
                "cookie secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for AffinityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffinityConfig")
            .field("cookie_name", &self.cookie_name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// `[session_affinity]` section as it appears in the configuration file
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionAffinityConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default, skip_serializing)]
    pub secret: String,
}

fn default_enabled() -> bool {
    true
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

impl Default for SessionAffinityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: default_cookie_name(),
            secret: String::new(),
        }
    }
}

impl fmt::Debug for SessionAffinityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAffinityConfig")
            .field("enabled", &self.enabled)
            .field("cookie_name", &self.cookie_name)
            .field("secret", &if self.secret.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

impl SessionAffinityConfig {
    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; a set value also enables affinity
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cookie_name) = lookup(ENV_COOKIE_NAME) {
            debug!("Overriding affinity cookie name from {}", ENV_COOKIE_NAME);
            self.cookie_name = cookie_name;
            self.enabled = true;
        }
        if let Some(secret) = lookup(ENV_COOKIE_SECRET) {
            debug!("Overriding affinity cookie secret from {}", ENV_COOKIE_SECRET);
            self.secret = secret;
            self.enabled = true;
        }
    }

    /// Validated settings, `None` when affinity is disabled
    pub fn into_affinity(self) -> Result<Option<AffinityConfig>> {
        if !self.enabled {
            return Ok(None);
        }
        AffinityConfig::new(self.cookie_name, self.secret).map(Some)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    session_affinity: SessionAffinityConfig,
}

/// Parse the `[session_affinity]` section out of a TOML document
pub fn from_toml_str(content: &str) -> Result<SessionAffinityConfig> {
    let file: ConfigFile = toml::from_str(content)
        .map_err(|e| StickySessionError::Parse(format!("TOML parse error: {}", e)))?;
    Ok(file.session_affinity)
}

/// Load the `[session_affinity]` section from a TOML file
pub async fn load_from_file(path: &Path) -> Result<SessionAffinityConfig> {
    info!("Loading session affinity configuration from {}", path.display());

    if !path.exists() {
        return Err(StickySessionError::Configuration(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = from_toml_str(&content)?;

    info!(
        enabled = config.enabled,
        cookie_name = %config.cookie_name,
        "Loaded session affinity configuration"
    );
    Ok(config)
}
