//! Configuration loading and resolution
//!
//! Settings are resolved per field in priority order:
//! 1. Command-line argument or its environment variable
//! 2. TOML config file
//! 3. Compiled default
//!
//! The TOML file itself is located by: explicit path, `TAPDECK_CONFIG`,
//! `~/.config/tapdeck/config.toml`, `/etc/tapdeck/config.toml`. A missing
//! file is not fatal.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TAPDECK_CONFIG";

/// Environment variable supplying the manifest password
pub const MANIFEST_PASSWORD_ENV_VAR: &str = "TAPDECK_MANIFEST_PASSWORD";

const DEFAULT_PLAYER_URL: &str = "http://localhost:6680/mopidy/rpc";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_TRACKER_INTERVAL_MS: u64 = 5000;
const DEFAULT_READER_COMMAND: &str = "tapdeck-read-tag";

/// Bootstrap configuration as found in the TOML file
///
/// Every field is optional; unset fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub player_url: Option<String>,
    pub manifest_url: Option<String>,
    pub library_path: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub tracker_interval_ms: Option<u64>,
    pub reader_command: Option<Vec<String>>,
    pub library_scan_command: Option<Vec<String>>,
    pub manifest_auth: Option<ManifestAuth>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP basic-auth credentials for manifest and archive downloads
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestAuth {
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Locate and parse the config file, or fall back to an empty config
    ///
    /// Runs before logging is set up, so the caller reports the returned
    /// origin once its subscriber is installed.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, ConfigOrigin)> {
        match locate_config_file(explicit) {
            Some(path) => {
                let config = Self::load(&path)?;
                Ok((config, ConfigOrigin::File(path)))
            }
            None => Ok((Self::default(), ConfigOrigin::Defaults)),
        }
    }
}

/// Where the bootstrap configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// No config file was found
    Defaults,
}

/// Find the config file by priority order
///
/// An explicit path is returned even if it does not exist so that the
/// caller reports the real I/O error instead of silently using defaults.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("tapdeck").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/tapdeck/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Values supplied on the command line (or their environment variables)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub player_url: Option<String>,
    pub manifest_url: Option<String>,
    pub library_path: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub player_url: String,
    pub manifest_url: String,
    pub library_path: PathBuf,
    pub state_file: PathBuf,
    pub scratch_dir: PathBuf,
    pub poll_interval: Duration,
    pub tracker_interval: Duration,
    pub reader_command: Vec<String>,
    pub library_scan_command: Option<Vec<String>>,
    pub manifest_auth: Option<ManifestAuth>,
    pub log_level: String,
}

impl Settings {
    /// Merge overrides over the TOML config over compiled defaults, then validate
    pub fn resolve(overrides: Overrides, toml: TomlConfig) -> Result<Self> {
        let player_url = overrides
            .player_url
            .or(toml.player_url)
            .unwrap_or_else(|| DEFAULT_PLAYER_URL.to_string());

        let manifest_url = overrides
            .manifest_url
            .or(toml.manifest_url)
            .ok_or_else(|| Error::Config("manifest_url is required".to_string()))?;

        let library_path = overrides
            .library_path
            .or(toml.library_path)
            .unwrap_or_else(default_library_path);

        let state_file = overrides
            .state_file
            .or(toml.state_file)
            .unwrap_or_else(|| library_path.join("state.json"));

        let scratch_dir = toml
            .scratch_dir
            .unwrap_or_else(|| std::env::temp_dir().join("tapdeck"));

        let manifest_auth = toml.manifest_auth.map(|mut auth| {
            if let Ok(password) = std::env::var(MANIFEST_PASSWORD_ENV_VAR) {
                auth.password = Some(password);
            }
            auth
        });

        let settings = Self {
            player_url,
            manifest_url,
            library_path,
            state_file,
            scratch_dir,
            poll_interval: Duration::from_millis(
                toml.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            tracker_interval: Duration::from_millis(
                toml.tracker_interval_ms.unwrap_or(DEFAULT_TRACKER_INTERVAL_MS),
            ),
            reader_command: toml
                .reader_command
                .unwrap_or_else(|| vec![DEFAULT_READER_COMMAND.to_string()]),
            library_scan_command: toml.library_scan_command,
            manifest_auth,
            log_level: toml.logging.level,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_url("player_url", &self.player_url)?;
        validate_url("manifest_url", &self.manifest_url)?;

        let poll_ms = self.poll_interval.as_millis();
        if poll_ms == 0 || poll_ms >= 1000 {
            return Err(Error::Config(format!(
                "poll_interval_ms must be between 1 and 999, got {}",
                poll_ms
            )));
        }

        if self.tracker_interval.is_zero() {
            return Err(Error::Config("tracker_interval_ms must be positive".to_string()));
        }

        if self.reader_command.first().map_or(true, |c| c.is_empty()) {
            return Err(Error::Config("reader_command must name a program".to_string()));
        }

        if let Some(cmd) = &self.library_scan_command {
            if cmd.first().map_or(true, |c| c.is_empty()) {
                return Err(Error::Config(
                    "library_scan_command must name a program".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn validate_url(name: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(Error::Config(format!("{} must not be empty", name)));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::Config(format!(
            "{} must start with http:// or https://, got {}",
            name, url
        )));
    }
    Ok(())
}

/// Default local content library
fn default_library_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tapdeck").join("library"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/tapdeck/library"))
}
