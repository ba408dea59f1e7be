use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HTTP_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_TRANSFER_DESTINATION: &str = "sip:tester@testing2.sip.twilio.com";
pub const DEFAULT_CARRIER_API_BASE_URL: &str = "https://api.twilio.com";
pub const DEFAULT_ASSETS_DIR: &str = "assets";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Process-wide settings, built once at startup and shared read-only.
#[derive(Clone)]
pub struct Config {
    pub http_bind_addr: SocketAddr,
    /// Host name (no scheme) used for asset, websocket and callback URLs.
    pub public_host: Option<String>,
    pub assets_dir: PathBuf,
    pub carrier: CarrierConfig,
    pub session_token_secret: Option<String>,
    pub transfer_destination: String,
    pub timeouts: Timeouts,
}

/// Call-control account credentials. The auth token doubles as the
/// webhook signing key.
#[derive(Clone)]
pub struct CarrierConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct Timeouts {
    pub carrier_http: Duration,
    pub stream_start: Duration,
}

impl Config {
    /// Create a Config from environment variables, falling back to defaults when keys are absent.
    ///
    /// Reads:
    /// - HTTP_BIND_ADDR (default "0.0.0.0:8000")
    /// - PUBLIC_HOST, falling back to HOST (optional; scheme and trailing slash are stripped)
    /// - ASSETS_DIR (default "assets")
    /// - VOICECALL_ACCOUNT_SID / VOICECALL_AUTH_TOKEN (optional)
    /// - CARRIER_API_BASE_URL (default "https://api.twilio.com")
    /// - SESSION_TOKEN_SECRET, falling back to WEBSOCKET_SIGNATURE (optional)
    /// - TRANSFER_DESTINATION_URI, falling back to SIP_TRANSFER_URL
    /// - CARRIER_HTTP_TIMEOUT_MS (default 5000) / STREAM_START_TIMEOUT_MS (default 10000)
    ///
    /// Missing secrets are not an error here: the operations that need them
    /// fail closed at call time instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use voicecall_gateway::config::Config;
    ///
    /// let cfg = Config::from_env().unwrap();
    /// let _addr = cfg.http_bind_addr;
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_raw = std::env::var("HTTP_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_HTTP_BIND_ADDR.to_string());
        let http_bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "HTTP_BIND_ADDR",
                value: bind_raw.clone(),
            })?;

        let public_host = env_non_empty("PUBLIC_HOST")
            .or_else(|| env_non_empty("HOST"))
            .map(|value| normalize_host(&value))
            .filter(|value| !value.is_empty());

        let assets_dir = PathBuf::from(
            env_non_empty("ASSETS_DIR").unwrap_or_else(|| DEFAULT_ASSETS_DIR.to_string()),
        );

        let carrier = CarrierConfig {
            account_sid: env_non_empty("VOICECALL_ACCOUNT_SID"),
            auth_token: env_non_empty("VOICECALL_AUTH_TOKEN"),
            api_base_url: env_non_empty("CARRIER_API_BASE_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_CARRIER_API_BASE_URL.to_string()),
        };

        let session_token_secret =
            env_non_empty("SESSION_TOKEN_SECRET").or_else(|| env_non_empty("WEBSOCKET_SIGNATURE"));

        let transfer_destination = env_non_empty("TRANSFER_DESTINATION_URI")
            .or_else(|| env_non_empty("SIP_TRANSFER_URL"))
            .unwrap_or_else(|| DEFAULT_TRANSFER_DESTINATION.to_string());

        Ok(Self {
            http_bind_addr,
            public_host,
            assets_dir,
            carrier,
            session_token_secret,
            transfer_destination,
            timeouts: Timeouts::from_env(),
        })
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.carrier.auth_token.as_deref()
    }

    pub fn session_secret(&self) -> Option<&str> {
        self.session_token_secret.as_deref()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("http_bind_addr", &self.http_bind_addr)
            .field("public_host", &self.public_host)
            .field("assets_dir", &self.assets_dir)
            .field("carrier", &self.carrier)
            .field("session_token_secret", &redacted(&self.session_token_secret))
            .field("transfer_destination", &self.transfer_destination)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl CarrierConfig {
    /// `(account_sid, auth_token)` when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.account_sid.as_deref(), self.auth_token.as_deref()) {
            (Some(sid), Some(token)) => Some((sid, token)),
            _ => None,
        }
    }
}

impl fmt::Debug for CarrierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redacted(&self.auth_token))
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Timeouts {
    fn from_env() -> Self {
        // Defaults: call-control HTTP 5s, idle bound before `start` 10s.
        Self {
            carrier_http: env_duration_ms("CARRIER_HTTP_TIMEOUT_MS", 5_000),
            stream_start: env_duration_ms("STREAM_START_TIMEOUT_MS", 10_000),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            carrier_http: Duration::from_secs(5),
            stream_start: Duration::from_secs(10),
        }
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

/// "https://voice.example.com/" -> "voice.example.com"
pub fn normalize_host(value: &str) -> String {
    let value = value.trim();
    let value = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(value);
    value.trim_end_matches('/').to_string()
}

fn env_duration_ms(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(key, default_ms))
}

fn env_u64(key: &str, default_value: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Clone, Debug)]
pub enum LogMode {
    Stdout,
    File,
}

#[derive(Clone, Debug)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub mode: LogMode,
    pub format: LogFormat,
    pub dir: Option<String>,
    pub file_name: String,
}

impl LoggingConfig {
    fn from_env() -> Self {
        let dir_env = env_non_empty("LOG_DIR");
        let format = match env_non_empty("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let mode = match env_non_empty("LOG_MODE").as_deref() {
            Some("file") => LogMode::File,
            Some("stdout") => LogMode::Stdout,
            _ if dir_env.is_some() => LogMode::File,
            _ => LogMode::Stdout,
        };
        let dir = match mode {
            LogMode::File => Some(dir_env.unwrap_or_else(|| "logs".to_string())),
            LogMode::Stdout => None,
        };
        let file_name = env_non_empty("LOG_FILE_NAME").unwrap_or_else(|| "app.log".to_string());

        Self {
            mode,
            format,
            dir,
            file_name,
        }
    }
}

static LOGGING: OnceLock<LoggingConfig> = OnceLock::new();

pub fn logging_config() -> &'static LoggingConfig {
    LOGGING.get_or_init(LoggingConfig::from_env)
}
