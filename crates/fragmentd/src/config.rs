//! Server configuration: file discovery, layering, and environment overlay.
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/fragments/config.toml` (system)
//! 2. `~/.config/fragments/config.toml` (user)
//! 3. `./fragments.toml` (local override), or the `--config` path
//! 4. Environment variables (`FRAGMENTS_*`)
//!
//! ```toml
//! [bind]
//! host = "0.0.0.0"
//! http_port = 8080
//!
//! [telemetry]
//! log_level = "info,fragmentd=debug"
//!
//! [limits]
//! max_body_bytes = 5242880
//!
//! [auth.users]
//! "user1@email.com" = "password1"
//!
//! [store]
//! backend = "memory"
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use fragments::StoreConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives. `RUST_LOG` wins when set.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info,fragmentd=debug,fragments=debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Basic auth users, email to password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub users: BTreeMap<String, String>,
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: BindConfig,
    pub telemetry: TelemetryConfig,
    pub limits: LimitsConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Load configuration from an optional path and report where values came from.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./fragments.toml` override. System and user configs still load first.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = discover_config_files_with_override(config_path)?;
        let mut config = load_files(&files)?;

        let mut sources = ConfigSources {
            files,
            env_overrides: Vec::new(),
        };
        apply_env_overrides(&mut config, &mut sources)?;
        config.validate()?;

        Ok((config, sources))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_body_bytes must be greater than zero".into(),
            ));
        }
        if self.auth.users.keys().any(|email| email.is_empty()) {
            return Err(ConfigError::Invalid("auth.users has an empty email".into()));
        }
        Ok(())
    }
}

/// Discover config files, optionally with a CLI override path.
///
/// Returns paths in load order (system, user, local/cli). Only existing files
/// are returned, except that a CLI path which does not exist is an error.
pub fn discover_config_files_with_override(
    cli_path: Option<&Path>,
) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/fragments/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("fragments/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        files.push(path.to_path_buf());
        return Ok(files);
    }

    let local = PathBuf::from("fragments.toml");
    if local.exists() {
        files.push(local);
    }

    Ok(files)
}

/// Load and merge the given files in order over compiled defaults.
pub fn load_files(paths: &[PathBuf]) -> Result<ServerConfig, ConfigError> {
    let mut merged = toml::Table::new();
    for path in paths {
        let table = read_table(path)?;
        // Shape errors are reported against the file that caused them.
        toml::Value::Table(table.clone())
            .try_into::<ServerConfig>()
            .map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        merge_tables(&mut merged, table);
    }

    toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Invalid(e.to_string()))
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deep merge: nested tables merge key by key, anything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Overlay `FRAGMENTS_*` environment variables.
pub fn apply_env_overrides(
    config: &mut ServerConfig,
    sources: &mut ConfigSources,
) -> Result<(), ConfigError> {
    if let Ok(v) = env::var("FRAGMENTS_HTTP_PORT") {
        config.bind.http_port = v.parse().map_err(|_| ConfigError::Env {
            var: "FRAGMENTS_HTTP_PORT",
            message: format!("not a port number: {v}"),
        })?;
        sources.env_overrides.push("FRAGMENTS_HTTP_PORT".to_string());
    }

    if let Ok(v) = env::var("FRAGMENTS_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("FRAGMENTS_LOG_LEVEL".to_string());
    }

    let applied = config
        .store
        .apply_env()
        .map_err(|e| ConfigError::Invalid(format!("{e:#}")))?;
    sources
        .env_overrides
        .extend(applied.into_iter().map(String::from));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragments::BackendKind;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.http_port, 8080);
        assert_eq!(config.limits.max_body_bytes, 5 * 1024 * 1024);
        assert_eq!(config.store.backend, BackendKind::Memory);
        assert!(config.auth.users.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_single_file() {
        let file = write_config(
            r#"
[bind]
http_port = 9090

[auth.users]
"user1@email.com" = "password1"
"#,
        );
        let config = load_files(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(config.bind.http_port, 9090);
        assert_eq!(config.bind.host, "0.0.0.0");
        assert_eq!(
            config.auth.users.get("user1@email.com").map(String::as_str),
            Some("password1")
        );
    }

    #[test]
    fn test_later_files_win_and_tables_merge() {
        let system = write_config(
            r#"
[bind]
host = "127.0.0.1"
http_port = 8000

[auth.users]
"a@example.com" = "one"
"#,
        );
        let local = write_config(
            r#"
[bind]
http_port = 8001

[auth.users]
"b@example.com" = "two"

[limits]
max_body_bytes = 1024
"#,
        );

        let config =
            load_files(&[system.path().to_path_buf(), local.path().to_path_buf()]).unwrap();
        assert_eq!(config.bind.host, "127.0.0.1");
        assert_eq!(config.bind.http_port, 8001);
        assert_eq!(config.limits.max_body_bytes, 1024);
        assert_eq!(config.auth.users.len(), 2);
    }

    #[test]
    fn test_store_section() {
        let file = write_config(
            r#"
[store]
backend = "remote"

[store.remote]
table_url = "http://127.0.0.1:8000"
object_url = "http://127.0.0.1:9000"
"#,
        );
        let config = load_files(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(config.store.backend, BackendKind::Remote);
        assert_eq!(config.store.remote_config().unwrap().bucket, "fragments");
    }

    #[test]
    fn test_parse_error_names_file() {
        let file = write_config("[bind]\nhttp_port = \"not a number\"\n");
        let err = load_files(&[file.path().to_path_buf()]).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }

        let file = write_config("this is not toml = = =");
        assert!(matches!(
            load_files(&[file.path().to_path_buf()]),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_cli_path_is_an_error() {
        let result = discover_config_files_with_override(Some(Path::new(
            "/definitely/not/here/fragments.toml",
        )));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn test_cli_path_is_last() {
        let file = write_config("[bind]\nhttp_port = 7000\n");
        let files = discover_config_files_with_override(Some(file.path())).unwrap();
        assert_eq!(files.last().map(PathBuf::as_path), Some(file.path()));
    }

    #[test]
    fn test_load_with_sources_from_cli_path() {
        let file = write_config("[auth.users]\n\"user1@email.com\" = \"password1\"\n");
        let (config, sources) = ServerConfig::load_with_sources_from(Some(file.path())).unwrap();
        assert_eq!(sources.files.last().map(PathBuf::as_path), Some(file.path()));
        assert!(config.auth.users.contains_key("user1@email.com"));

        let missing = file.path().with_extension("missing");
        assert!(ServerConfig::load_with_sources_from(Some(&missing)).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_body_limit() {
        let mut config = ServerConfig::default();
        config.limits.max_body_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_overrides() {
        // The only test in this crate touching these variables.
        env::set_var("FRAGMENTS_HTTP_PORT", "8123");
        env::set_var("FRAGMENTS_LOG_LEVEL", "warn");

        let mut config = ServerConfig::default();
        let mut sources = ConfigSources::default();
        let result = apply_env_overrides(&mut config, &mut sources);

        env::remove_var("FRAGMENTS_HTTP_PORT");
        env::remove_var("FRAGMENTS_LOG_LEVEL");

        result.unwrap();
        assert_eq!(config.bind.http_port, 8123);
        assert_eq!(config.telemetry.log_level, "warn");
        assert!(sources
            .env_overrides
            .contains(&"FRAGMENTS_HTTP_PORT".to_string()));
    }
}
