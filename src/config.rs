//! Runtime configuration handling

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::qr::ImageFormat;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrGenConfig {
    /// Defaults for generated codes
    pub generation: GenerationOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl QrGenConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No ksef-qr.toml / ksef-qr.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["ksef-qr.toml", "ksef-qr.yaml", "ksef-qr.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("ksef-qr");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        let config: Self = match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            })?,
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            })?,
            other => {
                return Err(Error::Config(format!(
                    "Unsupported config format '{}', expected toml/yaml",
                    other
                )));
            }
        };

        config
            .generation
            .environment()
            .map_err(|e| with_context(e, &path.display().to_string()))?;
        Ok(config)
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) -> Result<()> {
        self.generation.apply_overrides(|key| env::var(key).ok())?;
        self.logging.apply_env_overrides();
        Ok(())
    }
}

/// Defaults applied when the command line leaves a setting out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// KSeF environment tag (`test`, `demo`, `prod`), resolved through
    /// [`GenerationOptions::environment`]
    #[serde(rename = "environment")]
    pub environment_tag: String,
    /// Output image format
    pub format: ImageFormat,
    /// Directory receiving generated images
    pub out_dir: Option<PathBuf>,
    /// File that receives one line per generated link
    pub link_log: Option<PathBuf>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            environment_tag: Environment::default().tag().to_string(),
            format: ImageFormat::default(),
            out_dir: None,
            link_log: None,
        }
    }
}

impl GenerationOptions {
    /// Resolve the configured environment tag.
    pub fn environment(&self) -> Result<Environment> {
        Environment::parse(&self.environment_tag)
    }

    pub(crate) fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Invalid values fail here so a typo never silently targets another environment
        if let Some(environment) = lookup("KSEF_QR_ENV") {
            Environment::parse(&environment).map_err(|e| with_context(e, "KSEF_QR_ENV"))?;
            self.environment_tag = environment;
        }
        if let Some(format) = lookup("KSEF_QR_FORMAT") {
            self.format = format
                .parse::<ImageFormat>()
                .map_err(|e| with_context(e, "KSEF_QR_FORMAT"))?;
        }
        if let Some(dir) = lookup("KSEF_QR_OUT_DIR") {
            self.out_dir = non_empty_path(&dir);
        }
        if let Some(log) = lookup("KSEF_QR_LINK_LOG") {
            self.link_log = non_empty_path(&log);
        }
        Ok(())
    }
}

fn with_context(err: Error, context: &str) -> Error {
    match err {
        Error::InvalidParameter(message) => {
            Error::InvalidParameter(format!("{context}: {message}"))
        }
        other => other,
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    if value.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `KSEF_QR_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in terminal logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("KSEF_QR_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("KSEF_QR_LOG_FILE") {
            self.file = non_empty_path(&file);
        }
        if let Ok(color) = env::var("KSEF_QR_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(rotation) = env::var("KSEF_QR_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::parse(&rotation) {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}
