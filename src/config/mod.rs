// Configuration module entry point
// Layers built-in defaults, an optional JSON file and the environment

mod state;
mod types;

use std::net::SocketAddr;
use std::path::Path;

use config::{ConfigError, Environment, File, FileFormat};

// Re-export public types
pub use state::AppState;
pub use types::{CompressionConfig, Config};
use types::{DEFAULT_FALLBACK_FILE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_STATIC_DIR};

/// Config file read when `SPA_SERVER_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = ".spa-server-config.json";

/// Environment variable naming an alternative config file
pub const CONFIG_FILE_ENV: &str = "SPA_SERVER_CONFIG";

/// Flat environment keys mapped onto top-level config fields
const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "STATIC_DIR",
    "SPA_FALLBACK_FILE",
    "CSP_HEADER",
    "HSTS_MAX_AGE",
    "WORKERS",
    "STRICT_METHODS",
    "TRUST_FORWARDED_PROTO",
];

/// Prefixes of nested environment keys, e.g. `LOGGING__LEVEL`
const ENV_SECTIONS: &[&str] = &["LOGGING__", "PERFORMANCE__", "SECURITY__", "COMPRESSION__"];

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug"];
const ACCESS_LOG_FORMATS: &[&str] = &["combined", "common", "json"];

impl Config {
    /// Load configuration from the config file and the process environment.
    /// Environment variables take precedence over the file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_FILE_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        Self::load_with(Some(Path::new(&path)), std::env::vars())
    }

    /// Load configuration from an optional JSON file and an explicit set of
    /// environment variables. Unknown variables and empty values are ignored.
    pub fn load_with<I>(file: Option<&Path>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env_map: config::Map<String, String> = env
            .into_iter()
            .filter(|(key, value)| !value.is_empty() && is_recognized_env_key(key))
            .collect();

        let mut builder = config::Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("static_dir", DEFAULT_STATIC_DIR)?
            .set_default("spa_fallback_file", DEFAULT_FALLBACK_FILE)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?;

        if let Some(path) = file {
            builder = builder.add_source(
                File::new(&path.to_string_lossy(), FileFormat::Json).required(false),
            );
        }

        let settings = builder
            .add_source(
                Environment::default()
                    .separator("__")
                    .source(Some(env_map)),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fallback = self.spa_fallback_file.as_str();
        if fallback.is_empty()
            || fallback.contains(|c: char| c == '/' || c == '\\')
            || fallback == "."
            || fallback == ".."
        {
            return Err(ConfigError::Message(format!(
                "invalid SPA_FALLBACK_FILE: {fallback:?}"
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Message(format!(
                "invalid logging.level: {:?} (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        if !ACCESS_LOG_FORMATS.contains(&self.logging.access_log_format.as_str()) {
            return Err(ConfigError::Message(format!(
                "invalid logging.access_log_format: {:?} (expected one of {})",
                self.logging.access_log_format,
                ACCESS_LOG_FORMATS.join(", ")
            )));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// URL path of the fallback file, e.g. `/index.html`
    pub fn fallback_url_path(&self) -> String {
        format!("/{}", self.spa_fallback_file)
    }
}

fn is_recognized_env_key(key: &str) -> bool {
    ENV_KEYS.contains(&key) || ENV_SECTIONS.iter().any(|prefix| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_with(None, env(&[])).unwrap();
        assert_eq!(cfg.static_dir, "./client/dist");
        assert_eq!(cfg.spa_fallback_file, "index.html");
        assert_eq!(cfg.port, 8080);
        assert!(cfg.csp_header.is_none());
        assert!(cfg.hsts_max_age.is_none());
        assert_eq!(cfg.preload, vec!["vite.svg".to_string()]);
        assert!(cfg.compression.enabled);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let cfg =
            Config::load_with(Some(Path::new("/nonexistent/spa-config.json")), env(&[])).unwrap();
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_file_values() {
        let file = write_config(
            r#"{"static_dir": "./file_static", "spa_fallback_file": "file.html", "port": 9090,
                "csp_header": "default-src 'self'", "hsts_max_age": 600}"#,
        );
        let cfg = Config::load_with(Some(file.path()), env(&[])).unwrap();
        assert_eq!(cfg.static_dir, "./file_static");
        assert_eq!(cfg.spa_fallback_file, "file.html");
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.csp_header.as_deref(), Some("default-src 'self'"));
        assert_eq!(cfg.hsts_max_age, Some(600));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let file = write_config("{ invalid json");
        assert!(Config::load_with(Some(file.path()), env(&[])).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(
            r#"{"static_dir": "./file_static", "spa_fallback_file": "file.html", "port": 9090}"#,
        );
        let cfg = Config::load_with(
            Some(file.path()),
            env(&[
                ("STATIC_DIR", "./env_static"),
                ("SPA_FALLBACK_FILE", "env.html"),
                ("PORT", "9000"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.static_dir, "./env_static");
        assert_eq!(cfg.spa_fallback_file, "env.html");
        assert_eq!(cfg.port, 9000);
    }

    #[test]
    fn test_empty_env_value_is_unset() {
        let cfg = Config::load_with(
            None,
            env(&[("SPA_FALLBACK_FILE", ""), ("PORT", "")]),
        )
        .unwrap();
        assert_eq!(cfg.spa_fallback_file, "index.html");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_unrelated_env_is_ignored() {
        let cfg = Config::load_with(
            None,
            env(&[("HOME", "/root"), ("LOGGING", "loud"), ("PATH", "/bin")]),
        )
        .unwrap();
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_nested_env_keys() {
        let cfg = Config::load_with(
            None,
            env(&[
                ("LOGGING__LEVEL", "debug"),
                ("COMPRESSION__ENABLED", "false"),
                ("SECURITY__X_FRAME_OPTIONS", "SAMEORIGIN"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert!(!cfg.compression.enabled);
        assert_eq!(cfg.security.x_frame_options.as_deref(), Some("SAMEORIGIN"));
    }

    #[test]
    fn test_invalid_port_env() {
        assert!(Config::load_with(None, env(&[("PORT", "invalid")])).is_err());
    }

    #[test]
    fn test_invalid_hsts_env() {
        assert!(Config::load_with(None, env(&[("HSTS_MAX_AGE", "forever")])).is_err());
    }

    #[test]
    fn test_hsts_env() {
        let cfg = Config::load_with(None, env(&[("HSTS_MAX_AGE", "31536000")])).unwrap();
        assert_eq!(cfg.hsts_max_age, Some(31_536_000));
    }

    #[test]
    fn test_fallback_with_separator_rejected() {
        let err = Config::load_with(None, env(&[("SPA_FALLBACK_FILE", "sub/index.html")]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid SPA_FALLBACK_FILE"));
    }

    #[test]
    fn test_empty_fallback_in_file_rejected() {
        let file = write_config(r#"{"spa_fallback_file": ""}"#);
        assert!(Config::load_with(Some(file.path()), env(&[])).is_err());
    }

    #[test]
    fn test_validate_direct() {
        let mut cfg = Config::default();
        assert!(cfg.validate().is_ok());
        cfg.spa_fallback_file = "..".to_string();
        assert!(cfg.validate().is_err());
        cfg.spa_fallback_file = "a\\b.html".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(Config::load_with(None, env(&[("LOGGING__LEVEL", "verbose")])).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::default();
        assert_eq!(cfg.socket_addr().unwrap().port(), 8080);
        assert_eq!(cfg.fallback_url_path(), "/index.html");
    }
}
