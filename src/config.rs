//! Process-wide configuration and remote source availability
//!
//! Configuration is read from `BOOKPAGE_*` environment variables once per
//! process and is read-only afterwards. Whether the remote data service is
//! configured is answered through [`SourceAvailability`] rather than by
//! reading the environment ad hoc.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use ::config::{Config, Environment};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{ResolutionError, Result};

/// Environment variable prefix, e.g. `BOOKPAGE_API_SERVER_URL`
pub const ENV_PREFIX: &str = "BOOKPAGE";

static GLOBAL_CONFIG: OnceLock<ApiConfig> = OnceLock::new();

/// Reports whether a remote data service is configured
///
/// Implementations must be pure and infallible. If the answer cannot be
/// determined, report `false` so resolvers take the local path.
pub trait SourceAvailability: Send + Sync {
    fn is_configured(&self) -> bool;
}

/// Resolver configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the remote data service; blank means unconfigured
    #[serde(default)]
    pub api_server_url: Option<String>,

    /// Upper bound on a single remote call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Snapshot dataset file; the bundled dataset is used when unset
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Maximum number of cached remote responses
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Address the server binary binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(skip)]
    api_base_url: Option<Url>,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_cache_capacity() -> usize {
    crate::cache::DEFAULT_CACHE_CAPACITY
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_server_url: None,
            request_timeout_ms: default_request_timeout_ms(),
            snapshot_path: None,
            cache_capacity: default_cache_capacity(),
            listen_addr: default_listen_addr(),
            api_base_url: None,
        }
    }
}

impl ApiConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Load from an explicit variable map instead of the process environment
    ///
    /// Keys use the full variable name, e.g. `BOOKPAGE_API_SERVER_URL`.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(Some(vars)),
        )
    }

    /// Configuration pointing at `url`, defaults elsewhere
    pub fn with_api_server_url(url: impl Into<String>) -> Self {
        Self {
            api_server_url: Some(url.into()),
            ..Self::default()
        }
        .normalized()
    }

    /// Process-wide configuration, loaded on first use
    ///
    /// A configuration that fails to load is replaced by the default, which
    /// leaves the remote source unconfigured.
    pub fn global() -> &'static ApiConfig {
        GLOBAL_CONFIG.get_or_init(|| match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to load configuration, remote source disabled");
                ApiConfig::default()
            }
        })
    }

    /// Parsed remote base URL, if one is configured and valid
    pub fn api_base_url(&self) -> Option<&Url> {
        self.api_base_url.as_ref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let config: ApiConfig = Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ResolutionError::Config(e.to_string()))?;

        let config = config.normalized();
        debug!(
            configured = config.is_configured(),
            request_timeout_ms = config.request_timeout_ms,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn normalized(mut self) -> Self {
        self.api_base_url = self
            .api_server_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| match Url::parse(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(url = %raw, error = %e, "Ignoring invalid api server url");
                    None
                }
            });
        self
    }
}

impl SourceAvailability for ApiConfig {
    fn is_configured(&self) -> bool {
        self.api_base_url.is_some()
    }
}
