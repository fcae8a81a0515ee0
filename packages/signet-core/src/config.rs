//! Service endpoint configuration.
//!
//! Resolution priority:
//! 1. Environment variable (`SIGNET_SERVICE_URL`, optionally
//!    `SIGNET_WEBSITE_URL`)
//! 2. Config file (`~/.config/signet/config.toml`)
//!
//! Embedders that construct a [`ServiceConfig`] directly skip discovery
//! entirely.

use crate::service::RetryPolicy;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use url::Url;

/// Environment variable overriding the service URL.
const ENV_SERVICE_URL: &str = "SIGNET_SERVICE_URL";

/// Environment variable overriding the website (hosted login pages) URL.
const ENV_WEBSITE_URL: &str = "SIGNET_WEBSITE_URL";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    identity: Option<IdentitySection>,
}

#[derive(Debug, Deserialize, Default)]
struct IdentitySection {
    /// Webservice base URL (e.g. "https://id.example.com/api")
    service_url: Option<String>,
    /// Hosted login pages URL (e.g. "https://www.example.com")
    website_url: Option<String>,
    /// Credential storage namespace shared with cooperating processes
    access_group: Option<String>,
}

/// Immutable configuration handed to an
/// [`IdentityService`](crate::service::IdentityService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_url: Url,
    pub website_url: Url,
    pub access_group: Option<String>,
    pub retry: RetryPolicy,
}

impl ServiceConfig {
    pub fn new(service_url: Url, website_url: Url) -> Self {
        Self {
            service_url,
            website_url,
            access_group: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_access_group(mut self, access_group: impl Into<String>) -> Self {
        self.access_group = Some(access_group.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Where a discovered configuration came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Loaded from environment variables
    Environment,
    /// Loaded from the config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Endpoints resolved by [`discover`].
#[derive(Debug, Clone)]
pub struct DiscoveredConfig {
    pub service_url: Url,
    pub website_url: Url,
    pub access_group: Option<String>,
    pub source: ConfigSource,
}

/// Get the path to the configuration file
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("signet").join("config.toml"))
}

/// Config file path as a display string, for status output.
pub fn config_file_path_string() -> String {
    config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/signet/config.toml".to_string())
}

/// Load configuration from the config file
fn load_config_file() -> Option<ConfigFile> {
    let path = config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn parse_url(value: &str, origin: &str) -> Option<Url> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!("Ignoring invalid URL from {}: {}", origin, e);
            None
        }
    }
}

/// Derive the website URL from the service URL when none was configured
/// (strip a trailing `/api` segment if present).
fn derive_website_url(service_url: &Url) -> Url {
    let raw = service_url.as_str().trim_end_matches('/');
    raw.strip_suffix("/api")
        .and_then(|stripped| Url::parse(stripped).ok())
        .unwrap_or_else(|| service_url.clone())
}

/// Resolve endpoints from the environment or the config file.
///
/// Returns `None` when neither names a service URL; callers then have to
/// provide a [`ServiceConfig`] explicitly.
pub fn discover() -> Option<DiscoveredConfig> {
    // Priority 1: environment variables
    if let Ok(raw) = std::env::var(ENV_SERVICE_URL) {
        if let Some(service_url) = parse_url(&raw, ENV_SERVICE_URL) {
            tracing::info!("Using service URL from environment: {}", service_url);
            let website_url = std::env::var(ENV_WEBSITE_URL)
                .ok()
                .and_then(|raw| parse_url(&raw, ENV_WEBSITE_URL))
                .unwrap_or_else(|| derive_website_url(&service_url));
            return Some(DiscoveredConfig {
                service_url,
                website_url,
                access_group: None,
                source: ConfigSource::Environment,
            });
        }
    }

    // Priority 2: config file
    let section = load_config_file()?.identity?;
    let service_url = parse_url(section.service_url.as_deref()?, "config file")?;
    tracing::info!("Using service URL from config file: {}", service_url);

    let website_url = section
        .website_url
        .as_deref()
        .and_then(|raw| parse_url(raw, "config file"))
        .unwrap_or_else(|| derive_website_url(&service_url));

    Some(DiscoveredConfig {
        service_url,
        website_url,
        access_group: section.access_group,
        source: ConfigSource::ConfigFile,
    })
}

/// Example config file contents, for `--help`-style output.
pub fn generate_example_config() -> String {
    r#"[identity]
# Webservice base URL
service_url = "https://id.example.com/api"

# Hosted login pages (defaults to service_url without a trailing /api)
website_url = "https://www.example.com"

# Credential storage namespace shared with cooperating processes
# access_group = "com.example.shared"
"#
    .to_string()
}
