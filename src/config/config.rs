use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::app_paths::AppPaths;

/// Environment variable that overrides `server.base_url`
pub const API_URL_ENV: &str = "DMS_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub view: ViewConfig,
    pub activity: ActivityConfig,
    pub downloads: DownloadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Backend root, without trailing slash
    pub base_url: String,

    /// Per-request timeout
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Rows per page for every table
    pub page_size: usize,

    /// Columns searched by `filter` on the users table
    pub user_search_fields: Vec<String>,

    /// Columns searched by `filter` on the documents table
    pub document_search_fields: Vec<String>,

    /// Columns searched by `filter` on the activity log
    pub log_search_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub poll_interval_secs: u64,

    /// Entries shown by `recent`
    pub recent_limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Where downloaded documents are written (defaults to the data dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            user_search_fields: vec!["id".into(), "email".into(), "role".into()],
            document_search_fields: vec![
                "id".into(),
                "name".into(),
                "upload_date".into(),
                "user_id".into(),
            ],
            log_search_fields: vec![
                "id".into(),
                "user_id".into(),
                "action".into(),
                "timestamp".into(),
            ],
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            recent_limit: 7,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl ActivityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Config {
    /// Load config from the default location, writing defaults on first run.
    /// `DMS_API_URL` is applied on top.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            default_config
        };

        config.override_base_url(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.view.page_size == 0 {
            anyhow::bail!("view.page_size must be at least 1");
        }
        if self.server.base_url.trim().is_empty() {
            anyhow::bail!("server.base_url must not be empty");
        }
        Ok(())
    }

    /// Replace the server URL when an override is given (env or `--server`)
    pub fn override_base_url(&mut self, url: Option<String>) {
        if let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            self.server.base_url = url;
        }
    }

    pub fn download_dir(&self) -> Result<PathBuf> {
        match &self.downloads.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(AppPaths::data_dir()?.join("downloads")),
        }
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("dms-cli").join("config.toml"))
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# DMS CLI Configuration File
# Location: ~/.config/dms-cli/config.toml (Linux)
#           ~/Library/Application Support/dms-cli/config.toml (macOS)
#           %APPDATA%\dms-cli\config.toml (Windows)

[server]
# Backend address. The DMS_API_URL environment variable and the --server
# flag take precedence over this value.
base_url = "http://127.0.0.1:8080"

# Seconds before a request is abandoned
timeout_secs = 30

[view]
# Rows per page in every table
page_size = 10

# Columns searched by the `filter` command
user_search_fields = ["id", "email", "role"]
document_search_fields = ["id", "name", "upload_date", "user_id"]
log_search_fields = ["id", "user_id", "action", "timestamp"]

[activity]
# How often `watch` refreshes the activity log
poll_interval_secs = 5

# Entries shown by `recent`
recent_limit = 7

[downloads]
# Where downloaded documents are saved (leave commented to use the data dir)
# directory = "/path/to/downloads"
"#
        .to_string()
    }
}
