use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Catalog file name inside the data directory
pub const DB_FILE_NAME: &str = "fastnas.db";

/// Thumbnail cache subdirectory inside the data directory
pub const THUMBNAIL_DIR_NAME: &str = "thumbs";

/// Upload body ceiling (50 GiB)
pub const DEFAULT_MAX_BODY_BYTES: u64 = 50 * 1024 * 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root for blobs, the thumbnail cache and the catalog file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Front-end assets served at `/`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

/// Overlay network settings. The credential is handed to whatever exposes the
/// listener beyond localhost; the service itself never interprets it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NetworkConfig {
    #[serde(default)]
    pub ts_auth_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("web/static")
}

fn default_max_body_bytes() -> u64 {
    DEFAULT_MAX_BODY_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        tracing::info!(
            "Storage config: data_dir={}, static_dir={}",
            config.storage.data_dir.display(),
            config.storage.static_dir.display()
        );
        Ok(config)
    }

    /// Config rooted at `data_dir` with every other value defaulted
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.data_dir = data_dir.into();
        config
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("DATA_DIR") {
            if !val.trim().is_empty() {
                self.storage.data_dir = PathBuf::from(val);
            }
        }
        if let Some(val) = lookup("TS_AUTH_KEY") {
            self.network.ts_auth_key = val;
        }
        if let Some(val) = lookup("FASTNAS_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("FASTNAS_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = lookup("FASTNAS_STATIC_DIR") {
            self.storage.static_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("FASTNAS_MAX_BODY_BYTES") {
            if let Ok(limit) = val.parse() {
                self.upload.max_body_bytes = limit;
            }
        }
    }

    /// Ensure required directories exist
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.storage.data_dir)?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join(DB_FILE_NAME)
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.storage.data_dir.join(THUMBNAIL_DIR_NAME)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Body limit as accepted by axum, saturating on narrow targets
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.upload.max_body_bytes).unwrap_or(usize::MAX)
    }

    pub fn has_network_credential(&self) -> bool {
        !self.network.ts_auth_key.is_empty()
    }
}
