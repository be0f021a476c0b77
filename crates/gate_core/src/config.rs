use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths;

const CONFIG_FILE_PATH: &str = "gate.toml";

/// Client configuration: where the backend lives and where local state
/// is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the wallet/stream API, without a trailing slash.
    pub api_base: String,
    /// Directory holding the persisted session record.
    pub data_dir: PathBuf,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        let mut config = Config {
            api_base: "https://api.mediagate.example".to_string(),
            data_dir: paths::data_dir(),
            request_timeout_secs: default_timeout_secs(),
        };

        // Read gate.toml first if it exists.
        if std::path::Path::new(CONFIG_FILE_PATH).exists() {
            if let Ok(content) = std::fs::read_to_string(CONFIG_FILE_PATH) {
                if let Ok(file_config) = toml::from_str::<Config>(&content) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables if they exist.
        if let Ok(api_base) = std::env::var("MEDIAGATE_API_BASE") {
            config.api_base = api_base;
        }
        if let Ok(data_dir) = std::env::var("MEDIAGATE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(timeout) = std::env::var("MEDIAGATE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.trim().parse::<u64>() {
                config.request_timeout_secs = secs;
            }
        }

        // A trailing slash would produce `//wallet/nonce` style URLs.
        while config.api_base.ends_with('/') {
            config.api_base.pop();
        }

        config
    }

    /// Config pointed at an arbitrary base URL, for tests and tools.
    pub fn with_api_base(api_base: impl Into<String>, data_dir: PathBuf) -> Self {
        let mut api_base = api_base.into();
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Config {
            api_base,
            data_dir,
            request_timeout_secs: default_timeout_secs(),
        }
    }
}
