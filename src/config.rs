//! Configuration file loading.
//!
//! Precedence: defaults, then `~/.config/tailscope/config.toml` (or `--config`),
//! then command line flags. A missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use tailscope_logs::TailConfig;
use tailscope_types::Severity;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5050";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("unknown log level '{0}' (expected debug, info, warning, error or critical)")]
    Level(String),
}

/// Raw file contents; every key optional
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub server: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub chunk_size: Option<usize>,
    pub fresh_highlight_ms: Option<u64>,
    pub long_poll_timeout_secs: Option<u64>,
    pub min_level: Option<String>,
    pub auto_scroll: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub batch: Option<bool>,
}

/// Values from the command line; `None` leaves the file/default value alone
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub server: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub chunk_size: Option<usize>,
    pub min_level: Option<Severity>,
    pub log_file: Option<PathBuf>,
    pub batch: bool,
}

/// Settings the app runs with
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub server: String,
    pub poll_interval: Duration,
    pub chunk_size: usize,
    pub fresh_highlight: Duration,
    pub long_poll_timeout_secs: u64,
    pub min_level: Severity,
    pub auto_scroll: bool,
    /// Diagnostics go here; the terminal belongs to the UI
    pub log_file: PathBuf,
    pub batch: bool,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let tail = TailConfig::default();
        Self {
            server: DEFAULT_SERVER.to_string(),
            poll_interval: tail.poll_interval,
            chunk_size: tail.chunk_size,
            fresh_highlight: tail.fresh_highlight,
            long_poll_timeout_secs: tail.long_poll_timeout_secs,
            min_level: tail.min_level,
            auto_scroll: true,
            log_file: default_log_path(),
            batch: false,
        }
    }
}

impl ResolvedConfig {
    pub fn tail_config(&self) -> TailConfig {
        TailConfig {
            poll_interval: self.poll_interval,
            chunk_size: self.chunk_size,
            fresh_highlight: self.fresh_highlight,
            long_poll_timeout_secs: self.long_poll_timeout_secs,
            min_level: self.min_level,
        }
    }
}

/// `~/.config/tailscope/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tailscope").join("config.toml"))
}

/// `tailscope.log` in the platform state dir, else the working directory
pub fn default_log_path() -> PathBuf {
    match dirs::state_dir().or_else(dirs::cache_dir) {
        Some(dir) => dir.join("tailscope").join("tailscope.log"),
        None => PathBuf::from("tailscope.log"),
    }
}

/// Load a config file; `Ok(None)` when it does not exist
pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Explicit path wins and must exist; otherwise the default location is tried
pub fn load_with_precedence(explicit: Option<&Path>) -> Result<Option<ConfigFile>, ConfigError> {
    match explicit {
        Some(path) => match load_config_file(path)? {
            Some(file) => Ok(Some(file)),
            None => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        },
        None => match default_config_path() {
            Some(path) => load_config_file(&path),
            None => Ok(None),
        },
    }
}

/// Fold the file into defaults, then apply command line overrides
pub fn resolve(
    file: Option<ConfigFile>,
    cli: CliOverrides,
) -> Result<ResolvedConfig, ConfigError> {
    let mut config = ResolvedConfig::default();

    if let Some(file) = file {
        if let Some(server) = file.server {
            config.server = server;
        }
        if let Some(ms) = file.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(size) = file.chunk_size {
            config.chunk_size = size;
        }
        if let Some(ms) = file.fresh_highlight_ms {
            config.fresh_highlight = Duration::from_millis(ms);
        }
        if let Some(secs) = file.long_poll_timeout_secs {
            config.long_poll_timeout_secs = secs;
        }
        if let Some(level) = file.min_level {
            config.min_level = Severity::parse(&level).ok_or(ConfigError::Level(level))?;
        }
        if let Some(auto_scroll) = file.auto_scroll {
            config.auto_scroll = auto_scroll;
        }
        if let Some(path) = file.log_file {
            config.log_file = path;
        }
        if let Some(batch) = file.batch {
            config.batch = batch;
        }
    }

    if let Some(server) = cli.server {
        config.server = server;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    if let Some(level) = cli.min_level {
        config.min_level = level;
    }
    if let Some(path) = cli.log_file {
        config.log_file = path;
    }
    config.batch |= cli.batch;

    // A zero chunk would never make progress
    config.chunk_size = config.chunk_size.max(1);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_an_error() {
        let path = std::env::temp_dir().join("tailscope-does-not-exist/config.toml");
        assert!(load_config_file(&path).unwrap().is_none());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("tailscope-does-not-exist/explicit.toml");
        assert!(matches!(
            load_with_precedence(Some(&path)),
            Err(ConfigError::Read { path: p, .. }) if p == path
        ));
    }

    #[test]
    fn test_explicit_file_loaded() {
        let dir = std::env::temp_dir().join(format!("tailscope-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "chunk_size = 42\n").unwrap();

        let file = load_with_precedence(Some(&path)).unwrap().unwrap();
        assert_eq!(file.chunk_size, Some(42));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_log_file_defaults_off_terminal() {
        let config = ResolvedConfig::default();
        assert!(config.log_file.ends_with("tailscope.log"));

        let cli = CliOverrides {
            log_file: Some(PathBuf::from("/tmp/custom.log")),
            ..Default::default()
        };
        assert_eq!(resolve(None, cli).unwrap().log_file, PathBuf::from("/tmp/custom.log"));
    }

    #[test]
    fn test_file_values_fill_defaults() {
        let file: ConfigFile = toml::from_str(
            r#"
            server = "http://example:8000"
            chunk_size = 250
            min_level = "warn"
            "#,
        )
        .unwrap();

        let config = resolve(Some(file), CliOverrides::default()).unwrap();
        assert_eq!(config.server, "http://example:8000");
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.min_level, Severity::Warning);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert!(config.auto_scroll);
    }

    #[test]
    fn test_cli_beats_file() {
        let file = ConfigFile {
            server: Some("http://file:1".into()),
            poll_interval_ms: Some(500),
            ..Default::default()
        };
        let cli = CliOverrides {
            server: Some("http://cli:2".into()),
            batch: true,
            ..Default::default()
        };

        let config = resolve(Some(file), cli).unwrap();
        assert_eq!(config.server, "http://cli:2");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.batch);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let parsed: Result<ConfigFile, _> = toml::from_str("colour = \"red\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_bad_level_reported() {
        let file = ConfigFile {
            min_level: Some("loud".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve(Some(file), CliOverrides::default()),
            Err(ConfigError::Level(level)) if level == "loud"
        ));
    }

    #[test]
    fn test_zero_chunk_size_clamped() {
        let cli = CliOverrides {
            chunk_size: Some(0),
            ..Default::default()
        };
        assert_eq!(resolve(None, cli).unwrap().chunk_size, 1);
    }

    #[test]
    fn test_tail_config_carries_settings() {
        let config = ResolvedConfig {
            chunk_size: 7,
            min_level: Severity::Error,
            ..Default::default()
        };
        let tail = config.tail_config();
        assert_eq!(tail.chunk_size, 7);
        assert_eq!(tail.min_level, Severity::Error);
    }
}
