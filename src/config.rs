//! Configuration management for seisplot.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::datacenter::{default_aliases, default_endpoints, DataCenterResolver};
use crate::error::{Result, SeisplotError};
use crate::plot::{default_phase_colors, parse_hex_color};
use crate::retry::DEFAULT_MAX_ATTEMPTS;

/// Command-line arguments for seisplot
#[derive(Parser, Debug)]
#[command(name = "seisplot")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "SEISPLOT_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SEISPLOT_PORT")]
    pub port: Option<u16>,

    /// Number of worker threads
    #[arg(short, long, env = "SEISPLOT_WORKERS")]
    pub workers: Option<usize>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "SEISPLOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SEISPLOT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Data center used when a query has no `dc` parameter
    #[arg(long, env = "SEISPLOT_DEFAULT_DC")]
    pub default_data_center: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,
}

/// How this product identifies itself to data centers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default = "default_product")]
    pub product: String,

    #[serde(default = "default_product_version")]
    pub version: String,

    #[serde(default = "default_product_url")]
    pub url: String,
}

/// Waveform retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Data center used when a query has no `dc` parameter
    #[serde(default = "default_data_center")]
    pub default_data_center: String,

    /// Attempts per network call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// HTTP timeout for each data-center request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub user_agent: UserAgentConfig,
}

/// Data-center lookup tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCentersConfig {
    /// Catalog name → client label
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,

    /// Client label → base URL
    #[serde(default = "default_endpoints")]
    pub endpoints: BTreeMap<String, String>,
}

/// Plot appearance configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Phase label → `#RRGGBB` marker colour
    #[serde(default = "default_phase_colors")]
    pub phase_colors: BTreeMap<String, String>,
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub data_centers: DataCentersConfig,

    #[serde(default)]
    pub plot: PlotConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Build configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        // Override with command-line arguments and environment
        if let Some(host) = args.host {
            config.server.host = host;
        }
        if let Some(port) = args.port {
            config.server.port = port;
        }
        if args.workers.is_some() {
            config.server.workers = args.workers;
        }
        if let Some(log_level) = args.log_level {
            config.log_level = log_level;
        }
        if let Some(dc) = args.default_data_center {
            config.fetch.default_data_center = dc;
        }

        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.server.host = other.server.host;
        self.server.port = other.server.port;
        if other.server.workers.is_some() {
            self.server.workers = other.server.workers;
        }
        self.fetch = other.fetch;
        self.data_centers = other.data_centers;
        self.plot = other.plot;
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(SeisplotError::Config {
                message: "Server host cannot be empty".to_string(),
            });
        }

        // Validate port (0 is not a valid port for users)
        if self.server.port == 0 {
            return Err(SeisplotError::Config {
                message: "Server port cannot be 0".to_string(),
            });
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(SeisplotError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        if self.fetch.max_attempts == 0 {
            return Err(SeisplotError::Config {
                message: "fetch.max_attempts must be at least 1".to_string(),
            });
        }

        for (label, url) in &self.data_centers.endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SeisplotError::Config {
                    message: format!("Endpoint for {} is not an http(s) URL: {}", label, url),
                });
            }
        }

        for (phase, color) in &self.plot.phase_colors {
            if parse_hex_color(color).is_none() {
                return Err(SeisplotError::Config {
                    message: format!("Invalid colour for phase {}: {}", phase, color),
                });
            }
        }

        let resolver = DataCenterResolver::new(
            self.data_centers.aliases.clone(),
            self.data_centers.endpoints.clone(),
        );
        if resolver.resolve(&self.fetch.default_data_center).is_none() {
            return Err(SeisplotError::Config {
                message: format!(
                    "Default data center does not resolve: {}",
                    self.fetch.default_data_center
                ),
            });
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            fetch: FetchConfig::default(),
            data_centers: DataCentersConfig::default(),
            plot: PlotConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            version: default_product_version(),
            url: default_product_url(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_data_center: default_data_center(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: UserAgentConfig::default(),
        }
    }
}

impl Default for DataCentersConfig {
    fn default() -> Self {
        Self {
            aliases: default_aliases(),
            endpoints: default_endpoints(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            phase_colors: default_phase_colors(),
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_center() -> String {
    "IRISDMC".to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_product() -> String {
    "es-plotter".to_string()
}

fn default_product_version() -> String {
    "0.1".to_string()
}

fn default_product_url() -> String {
    "http://earthscope.org/plotter".to_string()
}
