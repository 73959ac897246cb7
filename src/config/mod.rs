//! Configuration management

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub welcome: WelcomeConfig,
}

/// Listener and session table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: String,

    /// TCP port (overridden by the positional CLI argument)
    pub port: u16,

    /// Number of session slots; the next connection past this is refused
    pub max_clients: usize,

    /// Bound of each session's delivery queue. Broadcasts to a full queue are dropped.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8989,
            max_clients: 10,
            queue_capacity: 32,
        }
    }
}

/// Where per-run history and log files live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub history_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_dir: PathBuf::from("historyFiles"),
            log_dir: PathBuf::from("logFiles"),
        }
    }
}

/// Banner shown to a client right after it connects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeConfig {
    /// Text file to send instead of the built-in banner
    pub banner_file: Option<PathBuf>,
}

/// Built-in banner. Ends with the name prompt, without a newline.
pub const DEFAULT_BANNER: &str = "Welcome to TCP-Chat!
         _nnnn_
        dGGGGMMb
       @p~qp~~qMb
       M|@||@) M|
       @,----.JM|
      JS^\\__/  qKL
     dZP        qKRb
    dZP          qKKb
   fZP            SMMb
   HZM            MMMM
   FqM            MMMM
 __| \".        |\\dS\"qML
 |    `.       | `' \\Zq
_)      \\.___.,|     .'
\\____   )MMMMMP|   .'
     `-'       `--'
[ENTER YOUR NAME]: ";

impl Config {
    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatrelay")
            .join("config.toml")
    }

    /// Socket address string for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// Resolve the welcome banner text
    pub fn banner(&self) -> Result<String> {
        match &self.welcome.banner_file {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Ok(DEFAULT_BANNER.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_server() {
        let config = Config::default();
        assert_eq!(config.server.port, 8989);
        assert_eq!(config.server.max_clients, 10);
        assert_eq!(config.listen_address(), "0.0.0.0:8989");
        assert!(config.banner().unwrap().ends_with("[ENTER YOUR NAME]: "));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.max_clients, 10);
        assert_eq!(config.storage.history_dir, PathBuf::from("historyFiles"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.queue_capacity, 32);
    }
}
