//! Client configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// REST backend configuration.
    pub api: ApiConfig,
    /// Asset (avatar/media) resolution configuration.
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Credential configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL every resource path is joined onto, e.g. `https://api.example.org/v1/`.
    pub base_url: String,
    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Asset resolution configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsConfig {
    /// Base URL relative avatar and media paths are joined with.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Number of entities requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Credential configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Bearer token, if the client runs as a signed-in user.
    #[serde(default)]
    pub token: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("volunteer-client/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_page_size() -> u32 {
    20
}

fn default_log_filter() -> String {
    "volunteer=info".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl ApiConfig {
    /// Create an API configuration with default timeouts.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }

    /// Whole-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// `VOLUNTEER__<SECTION>__<KEY>` variables; the prefix takes the same separator.
fn environment() -> config::Environment {
    config::Environment::with_prefix("VOLUNTEER")
        .separator("__")
        .try_parsing(true)
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `VOLUNTEER_ENV`)
    /// 3. Environment variables such as `VOLUNTEER__API__BASE_URL`
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("VOLUNTEER_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(environment())
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        config.try_deserialize()
    }
}
