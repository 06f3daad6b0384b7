use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Operator parameters, a single JSON document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote identifier for the database host; empty means local.
    #[serde(rename = "DB_SERVER", default)]
    pub db_server: String,
    /// File holding the explorer API key (one line).
    #[serde(rename = "ETHERSCAN_KEY_FILE")]
    pub etherscan_key_file: String,
    /// Smoothing factor for the bribe-ratio EMAs, in (0, 1].
    #[serde(rename = "EMA_alpha")]
    pub ema_alpha: f64,
    /// File holding the node provider HTTP and WSS URLs (two lines).
    #[serde(rename = "KEY_FILE", default = "default_key_file")]
    pub key_file: String,
    /// SQLite database path.
    #[serde(rename = "DB_FILE", default = "default_db_file")]
    pub db_file: String,
}

fn default_key_file() -> String {
    "keys/alchemy.sec".to_string()
}

fn default_db_file() -> String {
    "mev_monitor.db".to_string()
}

impl Config {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let raw = std::fs::read(expand_home(path.as_ref()))?;
        let config: Self = serde_json::from_slice(&raw)?;
        if !(config.ema_alpha > 0.0 && config.ema_alpha <= 1.0) {
            return Err(Error::Config(format!(
                "EMA_alpha must be in (0, 1], got {}",
                config.ema_alpha
            )));
        }
        Ok(config)
    }

    pub fn db_server(&self) -> Option<&str> {
        if self.db_server.is_empty() {
            None
        } else {
            Some(&self.db_server)
        }
    }
}

/// Node provider endpoints read from the key file.
#[derive(Clone, Debug)]
pub struct NodeKeys {
    pub http_url: String,
    pub wss_url: Option<String>,
}

pub fn load_node_keys<P: AsRef<Path>>(path: P) -> Result<NodeKeys, Error> {
    let raw = std::fs::read_to_string(expand_home(path.as_ref()))?;
    let mut lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
    let http_url = lines
        .next()
        .ok_or_else(|| Error::Config(format!("empty key file `{}`", path.as_ref().display())))?
        .to_string();
    let wss_url = lines.next().map(str::to_string);
    Ok(NodeKeys { http_url, wss_url })
}

/// Single-line secret, e.g. the explorer API key.
pub fn load_api_key<P: AsRef<Path>>(path: P) -> Result<String, Error> {
    let raw = std::fs::read_to_string(expand_home(path.as_ref()))?;
    let key = raw.trim();
    if key.is_empty() {
        return Err(Error::Config(format!("empty key file `{}`", path.as_ref().display())));
    }
    Ok(key.to_string())
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
