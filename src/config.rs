use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::common::{ClientError, ClientResult};

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
pub const DEFAULT_DATA_DIR: &str = "data";

const ENV_API_URL: &str = "TALKSYNC_API_URL";
const ENV_SERVER_URL: &str = "TALKSYNC_SERVER_URL";
const ENV_DATA_DIR: &str = "TALKSYNC_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// REST API base, e.g. `http://localhost:5000/api`.
    #[serde(default = "default_api_url")]
    pub api_base_url: String,
    /// Realtime endpoint; also the base for relative attachment URLs.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_url(),
            server_url: default_server_url(),
            data_dir: default_data_dir(),
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

impl AppConfig {
    /// Environment variables override the file; `lookup` is `std::env::var` in `main`.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = dir;
        }
        self
    }

    pub fn with_overrides(mut self, api_url: Option<String>, server_url: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.api_base_url = url;
        }
        if let Some(url) = server_url {
            self.server_url = url;
        }
        self
    }

    /// Attachment locators from the backend may be relative (`/uploads/..`).
    pub fn file_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// Socket.IO websocket endpoint derived from `server_url`.
    pub fn socket_url(&self) -> ClientResult<Url> {
        let mut url = Url::parse(&self.server_url)
            .map_err(|err| ClientError::Realtime(format!("invalid server url: {err}")))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::Realtime(format!(
                    "unsupported realtime scheme `{other}`"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Realtime("cannot switch to websocket scheme".into()))?;
        url.set_path("/socket.io/");
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(url)
    }

    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("client.db")
    }
}
