// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STATIC_DIR: &str = "./client/dist";
pub const DEFAULT_FALLBACK_FILE: &str = "index.html";

/// Main configuration structure
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory holding the SPA build output
    pub static_dir: String,
    /// Shell file served for `/` and for unmatched client routes
    pub spa_fallback_file: String,
    /// Content-Security-Policy value, omitted when unset
    #[serde(default)]
    pub csp_header: Option<String>,
    /// Strict-Transport-Security max-age in seconds, omitted when unset or zero
    #[serde(default)]
    pub hsts_max_age: Option<u64>,
    #[serde(default)]
    pub workers: Option<usize>,
    /// Reject methods other than GET/HEAD/OPTIONS
    #[serde(default)]
    pub strict_methods: bool,
    /// Honour `X-Forwarded-Proto: https` when deciding whether to send HSTS
    #[serde(default)]
    pub trust_forwarded_proto: bool,
    /// Extra small files preloaded next to the fallback file
    #[serde(default = "default_preload")]
    pub preload: Vec<String>,
    #[serde(default)]
    pub security: SecurityHeadersConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

#[allow(clippy::missing_const_for_fn)]
fn default_preload() -> Vec<String> {
    vec!["vite.svg".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            spa_fallback_file: DEFAULT_FALLBACK_FILE.to_string(),
            csp_header: None,
            hsts_max_age: None,
            workers: None,
            strict_methods: false,
            trust_forwarded_proto: false,
            preload: default_preload(),
            security: SecurityHeadersConfig::default(),
            compression: CompressionConfig::default(),
            logging: LoggingConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

/// Overrides for the always-on security headers
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SecurityHeadersConfig {
    #[serde(default)]
    pub x_content_type_options: Option<String>,
    #[serde(default)]
    pub x_frame_options: Option<String>,
    #[serde(default)]
    pub referrer_policy: Option<String>,
    #[serde(default)]
    pub permissions_policy: Option<String>,
}

/// Response compression settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompressionConfig {
    #[serde(default = "default_compression_enabled")]
    pub enabled: bool,
    /// Brotli quality, 0-11
    #[serde(default = "default_brotli_quality")]
    pub brotli_quality: u32,
    /// Gzip level, 0-9
    #[serde(default = "default_gzip_level")]
    pub gzip_level: u32,
    /// Bodies smaller than this are sent uncompressed
    #[serde(default)]
    pub min_size: usize,
}

#[allow(clippy::missing_const_for_fn)]
fn default_compression_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_brotli_quality() -> u32 {
    5
}

#[allow(clippy::missing_const_for_fn)]
fn default_gzip_level() -> u32 {
    6
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: default_compression_enabled(),
            brotli_quality: default_brotli_quality(),
            gzip_level: default_gzip_level(),
            min_size: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level: error, warn, info or debug
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive_timeout: 75,
            read_timeout: 30,
            write_timeout: 30,
            max_connections: None,
        }
    }
}
