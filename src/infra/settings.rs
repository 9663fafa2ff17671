//! Usage: Wallet connector settings (schema, TOML file loading, env overrides, validation).

use crate::shared::error::{WalletError, WalletResult};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/callback";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://getalby.com/oauth";
pub const DEFAULT_TOKEN_URL: &str = "https://api.getalby.com/oauth/token";
pub const DEFAULT_API_BASE_URL: &str = "https://api.getalby.com";
pub const DEFAULT_SCOPES: &[&str] = &[
    "account:read",
    "balance:read",
    "invoices:create",
    "invoices:read",
    "payments:send",
];
const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_FIAT_RATES_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd,eur,gbp,jpy,cad,aud,cny";
const DEFAULT_EXTENSION_DISCOVERY_TIMEOUT_MS: u64 = 500;
const DEFAULT_EXTENSION_POLL_INTERVAL_MS: u64 = 50;
const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FIAT_REFRESH_INTERVAL_SECS: u64 = 60 * 60;
const MIN_FIAT_REFRESH_INTERVAL_SECS: u64 = 60;
const MAX_EXTENSION_DISCOVERY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// Daily-rolling log files are written here when set.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            directory: None,
            file_prefix: "lnwallet".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub scopes: Vec<String>,
    /// Storage scope for persisted credentials (the page origin in a browser host).
    pub origin: String,
    pub credential_db_path: Option<PathBuf>,
    pub extension_discovery_timeout_ms: u64,
    pub extension_poll_interval_ms: u64,
    pub http_connect_timeout_secs: u64,
    pub fiat_rates_url: String,
    pub fiat_refresh_interval_secs: u64,
    pub logging: LoggingSettings,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            origin: DEFAULT_ORIGIN.to_string(),
            credential_db_path: None,
            extension_discovery_timeout_ms: DEFAULT_EXTENSION_DISCOVERY_TIMEOUT_MS,
            extension_poll_interval_ms: DEFAULT_EXTENSION_POLL_INTERVAL_MS,
            http_connect_timeout_secs: DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
            fiat_rates_url: DEFAULT_FIAT_RATES_URL.to_string(),
            fiat_refresh_interval_secs: DEFAULT_FIAT_REFRESH_INTERVAL_SECS,
            logging: LoggingSettings::default(),
        }
    }
}

impl WalletSettings {
    /// Defaults overlaid with `LNWALLET_*` environment variables.
    pub fn from_env() -> WalletResult<Self> {
        Self::default().with_env_get(|key| std::env::var(key).ok())
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> WalletResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WalletError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)?.with_env_get(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(raw: &str) -> WalletResult<Self> {
        toml::from_str(raw).map_err(|e| WalletError::Config(format!("invalid settings toml: {e}")))
    }

    pub fn with_env_get(mut self, mut get: impl FnMut(&str) -> Option<String>) -> WalletResult<Self> {
        let mut get_trimmed = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get_trimmed("LNWALLET_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = get_trimmed("LNWALLET_REDIRECT_URI") {
            self.redirect_uri = v;
        }
        if let Some(v) = get_trimmed("LNWALLET_AUTHORIZE_URL") {
            self.authorize_url = v;
        }
        if let Some(v) = get_trimmed("LNWALLET_TOKEN_URL") {
            self.token_url = v;
        }
        if let Some(v) = get_trimmed("LNWALLET_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = get_trimmed("LNWALLET_ORIGIN") {
            self.origin = v;
        }
        if let Some(v) = get_trimmed("LNWALLET_CREDENTIAL_DB") {
            self.credential_db_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get_trimmed("LNWALLET_EXTENSION_TIMEOUT_MS") {
            self.extension_discovery_timeout_ms = parse_u64(&v, "LNWALLET_EXTENSION_TIMEOUT_MS")?;
        }
        if let Some(v) = get_trimmed("LNWALLET_LOG") {
            self.logging.filter = v;
        }
        if let Some(v) = get_trimmed("LNWALLET_LOG_DIR") {
            self.logging.directory = Some(PathBuf::from(v));
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> WalletResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(WalletError::Config(
                "client_id is required (set LNWALLET_CLIENT_ID)".to_string(),
            ));
        }
        for (name, raw) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorize_url", &self.authorize_url),
            ("token_url", &self.token_url),
            ("api_base_url", &self.api_base_url),
            ("fiat_rates_url", &self.fiat_rates_url),
        ] {
            Url::parse(raw).map_err(|e| WalletError::Config(format!("{name} is invalid: {e}")))?;
        }
        if self.scopes.is_empty() {
            return Err(WalletError::Config("scopes must not be empty".to_string()));
        }
        if self.extension_discovery_timeout_ms > MAX_EXTENSION_DISCOVERY_TIMEOUT_MS {
            return Err(WalletError::Config(format!(
                "extension_discovery_timeout_ms must be <= {MAX_EXTENSION_DISCOVERY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    pub fn extension_discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.extension_discovery_timeout_ms)
    }

    pub fn extension_poll_interval(&self) -> Duration {
        Duration::from_millis(self.extension_poll_interval_ms.max(1))
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_secs.max(1))
    }

    /// `None` when `fiat_refresh_interval_secs` is 0, which turns the rate poller off.
    pub fn fiat_refresh_interval(&self) -> Option<Duration> {
        match self.fiat_refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs.max(MIN_FIAT_REFRESH_INTERVAL_SECS))),
        }
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

fn parse_u64(raw: &str, name: &str) -> WalletResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| WalletError::Config(format!("{name} must be an unsigned integer")))
}
