//! Configuration system
//!
//! Provides centralized configuration management with:
//! - Config file loading (TOML, optional)
//! - Environment variable overrides
//! - Runtime defaults
//! - Validation, including fail-fast lookup of router ids

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default RouterOS API port.
pub const DEFAULT_API_PORT: u16 = 8728;

/// Config file looked up in the working directory and written by `init-config`.
pub const DEFAULT_CONFIG_FILE: &str = "mikrotik-billing.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Store identity and billing behaviour
    pub app: AppConfig,

    /// Router connection timeouts
    pub network: NetworkConfig,

    /// Paths configuration
    pub paths: PathsConfig,

    /// Routers in display and synchronization order
    pub routers: Vec<RouterConfig>,

    /// File the configuration was read from, `None` when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store_name: String,
    pub store_address: String,
    pub footer_message: String,
    /// Router used when a command is not given `--router`; all routers when unset.
    pub default_router: Option<String>,
    /// `max-limit` written for every queue in the provisioning script.
    pub queue_max_limit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    pub io_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub manual_customers_file: PathBuf,
    pub provisioning_script: PathBuf,
    pub log_directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_username() -> String {
    "admin".to_string()
}

impl RouterConfig {
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "WARN".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_name: "WiFi Billing".to_string(),
            store_address: String::new(),
            footer_message: "Terima kasih telah membayar tepat waktu.".to_string(),
            default_router: None,
            queue_max_limit: "20M/20M".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            io_timeout_secs: 15,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mikrotik-billing");
        Self {
            manual_customers_file: data_dir.join("customers.json"),
            provisioning_script: PathBuf::from("queue_pelanggan.rsc"),
            log_directory: data_dir.join("logs"),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, the usual locations, or defaults,
    /// then apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_from_search_path()?,
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_search_path() -> Result<Self> {
        let config_paths = [
            PathBuf::from(DEFAULT_CONFIG_FILE),
            PathBuf::from(".mikrotik-billing.toml"),
            dirs::config_dir()
                .map(|d| d.join("mikrotik-billing").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in config_paths.iter().filter(|p| !p.as_os_str().is_empty()) {
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Network overrides
        if let Ok(val) = env::var("MIKROTIK_BILLING_CONNECT_TIMEOUT_SECS") {
            self.network.connect_timeout_secs = val
                .parse()
                .context("Invalid MIKROTIK_BILLING_CONNECT_TIMEOUT_SECS")?;
        }
        if let Ok(val) = env::var("MIKROTIK_BILLING_IO_TIMEOUT_SECS") {
            self.network.io_timeout_secs = val
                .parse()
                .context("Invalid MIKROTIK_BILLING_IO_TIMEOUT_SECS")?;
        }

        // Path overrides
        if let Ok(val) = env::var("MIKROTIK_BILLING_MANUAL_FILE") {
            self.paths.manual_customers_file = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MIKROTIK_BILLING_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.network.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Connect timeout must be greater than 0"));
        }
        if self.network.io_timeout_secs == 0 {
            return Err(anyhow::anyhow!("I/O timeout must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for router in &self.routers {
            if router.id.trim().is_empty() {
                return Err(anyhow::anyhow!("Router id must not be empty (host {})", router.host));
            }
            if !seen.insert(router.id.as_str()) {
                return Err(anyhow::anyhow!("Duplicate router id '{}'", router.id));
            }
            if router.host.trim().is_empty() {
                return Err(anyhow::anyhow!("Router '{}' has no host", router.id));
            }
            if router.port == 0 {
                return Err(anyhow::anyhow!("Router '{}' has port 0", router.id));
            }
        }

        if let Some(default_router) = &self.app.default_router {
            self.router(default_router)
                .context("app.default_router does not name a configured router")?;
        }

        if self.app.queue_max_limit.trim().is_empty() {
            return Err(anyhow::anyhow!("queue_max_limit must not be empty"));
        }

        // Create the log directory only when logs go to a file
        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }

    /// Problems worth a warning that do not stop the program.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.source.is_none() {
            warnings.push("No configuration file found, using defaults (no routers configured)".to_string());
        }
        for router in self.routers.iter().filter(|r| r.password.is_empty()) {
            warnings.push(format!("Router '{}' has an empty password", router.id));
        }
        warnings
    }

    /// Report where the configuration came from. Runs once logging is up,
    /// since loading happens before the subscriber exists.
    pub fn log_loaded(&self) {
        if let Some(source) = &self.source {
            info!(config_file = %source.display(), routers = self.routers.len(), "Configuration loaded");
        }
        for warning in self.warnings() {
            warn!("{}", warning);
        }
    }

    /// Router by id, falling back to a host match. Unknown routers are an error.
    pub fn router(&self, id_or_host: &str) -> Result<&RouterConfig> {
        self.routers
            .iter()
            .find(|r| r.id == id_or_host)
            .or_else(|| self.routers.iter().find(|r| r.host == id_or_host))
            .ok_or_else(|| {
                let known: Vec<&str> = self.routers.iter().map(|r| r.id.as_str()).collect();
                anyhow::anyhow!(
                    "Router '{}' not found in configuration (known: {})",
                    id_or_host,
                    if known.is_empty() { "none".to_string() } else { known.join(", ") }
                )
            })
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}
