use crate::data::pagination::{DEFAULT_PAGE_SIZE, RESULT_COUNT_CAP};
use crate::streaming::lifecycle::{StreamMessages, DEFAULT_APOLOGY, DEFAULT_CONNECT_FAILURE};
use crate::utils::app_paths::AppPaths;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub paging: PagingConfig,
    pub stream: StreamConfig,
    pub suggestions: SuggestionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Scheme, host and port of the search service, without a path
    pub base_url: String,

    /// Timeout for search and suggestion requests. The answer stream is
    /// not subject to it.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Results per page
    pub page_size: usize,

    /// Totals at or above this are shown as "<cap>+"
    pub result_count_cap: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// AI answer enabled when no preference has been saved yet
    pub enabled_by_default: bool,

    /// Shown when the stream fails before any text arrived
    pub apology_text: String,

    /// Shown when the connection cannot be created at all
    pub connect_failure_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Log entries kept in memory for diagnostics
    pub ring_buffer_entries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            result_count_cap: RESULT_COUNT_CAP,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: true,
            apology_text: DEFAULT_APOLOGY.to_string(),
            connect_failure_text: DEFAULT_CONNECT_FAILURE.to_string(),
        }
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ring_buffer_entries: 1000,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StreamConfig {
    pub fn messages(&self) -> StreamMessages {
        StreamMessages {
            apology: self.apology_text.clone(),
            connect_failure: self.connect_failure_text.clone(),
        }
    }
}

impl Config {
    /// Load config from the default location, writing the defaults there
    /// on first run
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::get_config_path()?)
    }

    /// Load `path`, first writing the commented default file there if it
    /// does not exist yet
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, Self::create_default_with_comments())?;
        }

        Self::load_from(path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        AppPaths::config_file()
    }

    pub fn validate(&self) -> Result<()> {
        if self.paging.page_size == 0 {
            bail!("paging.page_size must be at least 1");
        }
        if let Err(e) = reqwest::Url::parse(&self.api.base_url) {
            bail!("api.base_url '{}' is not a valid URL: {}", self.api.base_url, e);
        }
        Ok(())
    }

    /// A commented default config file
    pub fn create_default_with_comments() -> String {
        r#"# Search client configuration
# Location: ~/.config/search-client/config.toml (Linux)
#           ~/Library/Application Support/search-client/config.toml (macOS)

[api]
# Search service serving /api/search, /api/ai-stream and /api/query-suggestions
base_url = "http://127.0.0.1:5000"

# Timeout for search and suggestion requests, in seconds
request_timeout_secs = 30

[paging]
# Results shown per page
page_size = 15

# Totals at or above this are shown as "300+"
result_count_cap = 300

[stream]
# Stream an AI answer alongside the results until the user turns it off
enabled_by_default = true

# apology_text = "Sorry, something went wrong while generating the answer. Please try again later."
# connect_failure_text = "Unable to connect to the AI service."

[suggestions]
# Wait this long after the last request before asking for suggestions
debounce_ms = 300

[logging]
# Used when RUST_LOG is not set, e.g. "info" or "search=debug,stream=trace"
filter = "info"
ring_buffer_entries = 1000
"#
        .to_string()
    }
}
