//! Configuration from environment variables and an optional YAML file.
//!
//! **Environment variables:**
//! - `PORT`: server port (default: 7055)
//! - `GENSPARK_BASE_URL`: upstream origin (default: https://www.genspark.ai)
//! - `REQUEST_TIMEOUT_SECS`: upstream ask timeout (default: 36000)
//! - `AUTO_DEL_CHAT`: delete the upstream project after each answer (`1`/`true`)
//! - `GS_COOKIE`: comma separated session cookies
//!
//! A YAML file overrides any of the above:
//!
//! ```yaml
//! port: 9000
//! auto_delete_chat: true
//! cookies:
//!   - "session_id=..."
//! models:
//!   - "gpt-4o"
//! ```

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use secrecy::SecretString;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://www.genspark.ai";

const DEFAULT_MODELS: &[&str] = &["gpt-4o", "o1", "claude-3-5-sonnet", "gemini-1.5-pro"];

/// Session cookies the proxy may send upstream.
#[derive(Debug, Clone, Default)]
pub struct CookiePool {
    cookies: Vec<Arc<SecretString>>,
}

impl CookiePool {
    pub fn new<I, S>(cookies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(Into::into)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .map(|c| Arc::new(SecretString::from(c)))
                .collect(),
        }
    }

    /// Parse a comma separated cookie list.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    /// Pick a cookie uniformly at random.
    pub fn pick(&self) -> Option<Arc<SecretString>> {
        self.cookies.choose(&mut rand::thread_rng()).cloned()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub auto_delete_chat: bool,
    pub cookies: CookiePool,
    pub models: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProxyYamlConfig {
    port: Option<u16>,
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    auto_delete_chat: Option<bool>,
    #[serde(default)]
    cookies: Vec<String>,
    #[serde(default)]
    models: Vec<String>,
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(7055),
            base_url: env::var("GENSPARK_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(36_000),
            auto_delete_chat: env_flag("AUTO_DEL_CHAT").unwrap_or(false),
            cookies: env::var("GS_COOKIE")
                .map(|raw| CookiePool::from_csv(&raw))
                .unwrap_or_default(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ProxyConfig {
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read proxy config from {:?}", path))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml: ProxyYamlConfig =
            serde_yaml_ng::from_str(content).context("Failed to parse proxy config")?;
        let defaults = Self::default();

        Ok(Self {
            port: yaml.port.unwrap_or(defaults.port),
            base_url: yaml.base_url.unwrap_or(defaults.base_url),
            request_timeout_secs: yaml
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            auto_delete_chat: yaml.auto_delete_chat.unwrap_or(defaults.auto_delete_chat),
            cookies: if yaml.cookies.is_empty() {
                defaults.cookies
            } else {
                CookiePool::new(yaml.cookies)
            },
            models: if yaml.models.is_empty() {
                defaults.models
            } else {
                yaml.models
            },
        })
    }

    pub fn base_url_trimmed(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }
}
