//! Configuration types for storefront-dl

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Portal connection and credential settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal base URL, the root the API endpoints hang off
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// The auth host's login form URL the auth redirect must land on
    #[serde(default = "default_login_page")]
    pub login_page: String,

    /// Portal username
    #[serde(default)]
    pub username: String,

    /// Portal password
    #[serde(default)]
    pub password: String,

    /// Account number to scope shopping requests to (portal default if None)
    #[serde(default)]
    pub account_number: Option<String>,

    /// Page size requested from paginated endpoints (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_page: default_login_page(),
            username: String::new(),
            password: String::new(),
            account_number: None,
            page_size: default_page_size(),
            user_agent: default_user_agent(),
        }
    }
}

impl PortalConfig {
    /// Overlay credentials from `STOREFRONT_USERNAME` / `STOREFRONT_PASSWORD`
    ///
    /// Environment values win over file values, so configs can be committed
    /// without secrets.
    pub fn credentials_from_env(&mut self) {
        if let Ok(username) = std::env::var("STOREFRONT_USERNAME") {
            self.username = username;
        }
        if let Ok(password) = std::env::var("STOREFRONT_PASSWORD") {
            self.password = password;
        }
    }
}

/// Search and download behavior settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Character budget per search request's joined query string
    ///
    /// The portal rejects longer query strings outright, so term lists are
    /// chunked to stay under this (default: 1737, the observed limit).
    #[serde(default = "default_query_char_budget")]
    pub query_char_budget: usize,

    /// Concurrent search requests (default: 4)
    #[serde(default = "default_search_concurrency")]
    pub search_concurrency: usize,

    /// Concurrent per-product download requests (default: 10)
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query_char_budget: default_query_char_budget(),
            search_concurrency: default_search_concurrency(),
            download_concurrency: default_download_concurrency(),
        }
    }
}

/// Export output settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output file path (default: "./exports/products.csv")
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Cell delimiter (default: comma)
    #[serde(default)]
    pub delimiter: Delimiter,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            delimiter: Delimiter::default(),
        }
    }
}

/// Cell delimiter for exported tables
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// Comma-separated (.csv)
    #[default]
    Comma,
    /// Tab-separated (.tsv)
    Tab,
}

impl Delimiter {
    /// The delimiter character
    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
        }
    }
}

/// Retry behavior for transient portal failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial try (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 500ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Cap on any single retry delay (default: 10s)
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays to avoid thundering herd (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for storefront-dl
///
/// Fields are organized into logical sub-configs:
/// - [`portal`](PortalConfig) — connection and credentials
/// - [`search`](SearchConfig) — chunking budget and concurrency
/// - [`export`](ExportConfig) — output path and delimiter
/// - [`retry`](RetryConfig) — transient failure handling
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal connection and credential settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Search and download behavior settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Export output settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Retry behavior for transient portal failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Validate settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.portal.base_url.trim().is_empty() {
            return Err(config_error("portal base URL must not be empty", "portal.base_url"));
        }
        url::Url::parse(&self.portal.base_url).map_err(|e| {
            config_error(format!("portal base URL is invalid: {e}"), "portal.base_url")
        })?;
        url::Url::parse(&self.portal.login_page).map_err(|e| {
            config_error(format!("login page URL is invalid: {e}"), "portal.login_page")
        })?;
        if self.portal.username.is_empty() || self.portal.password.is_empty() {
            return Err(config_error(
                "portal credentials are required (set them in the config or via \
                 STOREFRONT_USERNAME/STOREFRONT_PASSWORD)",
                "portal.username",
            ));
        }
        if self.portal.page_size == 0 {
            return Err(config_error("page size must be at least 1", "portal.page_size"));
        }
        if self.search.query_char_budget == 0 {
            return Err(config_error(
                "query character budget must be at least 1",
                "search.query_char_budget",
            ));
        }
        if self.search.search_concurrency == 0 || self.search.download_concurrency == 0 {
            return Err(config_error(
                "concurrency limits must be at least 1",
                "search.search_concurrency",
            ));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_base_url() -> String {
    "https://shop.example.com".to_string()
}

fn default_login_page() -> String {
    "https://auth.shop.example.com/forms/login.fcc".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_user_agent() -> String {
    format!("storefront-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_query_char_budget() -> usize {
    1737
}

fn default_search_concurrency() -> usize {
    4
}

fn default_download_concurrency() -> usize {
    10
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./exports/products.csv")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}
