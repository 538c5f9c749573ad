//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument or its `STEREO_*` environment variable (highest)
//! 2. TOML config file
//! 3. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_DEFINITIONS_PATH: &str = "data/stereotypes.csv";
pub const DEFAULT_DATABASE_PATH: &str = "stereo-quiz.db";
pub const DEFAULT_REGIONS_PER_PARTICIPANT: usize = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SESSION_TTL_MINUTES: u64 = 120;

/// Fully resolved survey settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyConfig {
    pub host: String,
    pub port: u16,
    pub definitions_path: PathBuf,
    pub database_path: PathBuf,
    /// Target regions each participant annotates (K)
    pub regions_per_participant: usize,
    pub log_level: String,
    /// Idle minutes before an unfinished session is discarded
    pub session_ttl_minutes: u64,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            definitions_path: PathBuf::from(DEFAULT_DEFINITIONS_PATH),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            regions_per_participant: DEFAULT_REGIONS_PER_PARTICIPANT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub definitions_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub regions_per_participant: Option<usize>,
    pub log_level: Option<String>,
    pub session_ttl_minutes: Option<u64>,
}

/// On-disk TOML layout; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub definitions_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub regions_per_participant: Option<usize>,
    pub log_level: Option<String>,
    pub session_ttl_minutes: Option<u64>,
}

impl TomlConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }
}

/// Default per-user config file location, if the platform has one
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stereo-quiz").join("config.toml"))
}

/// Read the TOML layer
///
/// An explicit path wins over the per-user default. A missing file yields
/// an empty layer; an unreadable or invalid one is logged and ignored.
fn load_toml_layer(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit.map(Path::to_path_buf).or_else(default_config_file) {
        Some(path) => path,
        None => return TomlConfig::default(),
    };

    if !path.exists() {
        if explicit.is_some() {
            warn!("Config file not found: {}", path.display());
        }
        return TomlConfig::default();
    }

    match TomlConfig::from_file(&path) {
        Ok(config) => {
            debug!("Loaded config file {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Resolve settings from overrides, the TOML layer, and defaults
pub fn resolve_config(overrides: &ConfigOverrides, config_file: Option<&Path>) -> Result<SurveyConfig> {
    let file = load_toml_layer(config_file);
    merge(overrides, file)
}

fn merge(overrides: &ConfigOverrides, file: TomlConfig) -> Result<SurveyConfig> {
    let defaults = SurveyConfig::default();

    let config = SurveyConfig {
        host: overrides.host.clone().or(file.host).unwrap_or(defaults.host),
        port: overrides.port.or(file.port).unwrap_or(defaults.port),
        definitions_path: overrides
            .definitions_path
            .clone()
            .or(file.definitions_path)
            .unwrap_or(defaults.definitions_path),
        database_path: overrides
            .database_path
            .clone()
            .or(file.database_path)
            .unwrap_or(defaults.database_path),
        regions_per_participant: overrides
            .regions_per_participant
            .or(file.regions_per_participant)
            .unwrap_or(defaults.regions_per_participant),
        log_level: overrides
            .log_level
            .clone()
            .or(file.log_level)
            .unwrap_or(defaults.log_level),
        session_ttl_minutes: overrides
            .session_ttl_minutes
            .or(file.session_ttl_minutes)
            .unwrap_or(defaults.session_ttl_minutes),
    };

    if config.regions_per_participant == 0 {
        return Err(Error::Config(
            "regions_per_participant must be at least 1".to_string(),
        ));
    }

    if config.session_ttl_minutes == 0 {
        return Err(Error::Config(
            "session_ttl_minutes must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

impl SurveyConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let config = merge(&ConfigOverrides::default(), TomlConfig::default()).unwrap();
        assert_eq!(config, SurveyConfig::default());
        assert_eq!(config.port, 5001);
        assert_eq!(config.regions_per_participant, 5);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_toml("port = 8080\nregions_per_participant = 3\n");
        let config = resolve_config(&ConfigOverrides::default(), Some(file.path())).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.regions_per_participant, 3);
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_toml("port = 8080\nhost = \"0.0.0.0\"\n");
        let overrides = ConfigOverrides {
            port: Some(9000),
            ..Default::default()
        };
        let config = resolve_config(&overrides, Some(file.path())).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_file_is_ignored() {
        let file = write_toml("port = \"not a number\"\n");
        let config = resolve_config(&ConfigOverrides::default(), Some(file.path())).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_missing_explicit_file_falls_back() {
        let config = resolve_config(
            &ConfigOverrides::default(),
            Some(Path::new("/nonexistent/stereo.toml")),
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
    }

    #[test]
    fn test_session_ttl_from_file() {
        let file = write_toml("session_ttl_minutes = 15\n");
        let config = resolve_config(&ConfigOverrides::default(), Some(file.path())).unwrap();
        assert_eq!(config.session_ttl(), Duration::from_secs(900));

        let overrides = ConfigOverrides {
            session_ttl_minutes: Some(0),
            ..Default::default()
        };
        assert!(merge(&overrides, TomlConfig::default()).is_err());
    }

    #[test]
    fn test_zero_regions_rejected() {
        let overrides = ConfigOverrides {
            regions_per_participant: Some(0),
            ..Default::default()
        };
        let err = merge(&overrides, TomlConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
