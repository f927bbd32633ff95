// Application settings
// Loaded from ~/.config/appraise/settings.toml

use std::fs;
use std::path::{Path, PathBuf};

use appraise_engine::calc::WeightScale;
use appraise_engine::EngineOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound accepted for `engine.max_passes`.
pub const MAX_PASSES_LIMIT: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("engine.max_passes must be between 1 and {limit}, got {0}", limit = MAX_PASSES_LIMIT)]
    MaxPasses(usize),

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Passes per recalculation cycle before giving up on convergence.
    pub max_passes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_passes: appraise_engine::MAX_PASSES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleGridSettings {
    /// `percent` (weights sum to 100) or `fraction` (weights sum to 1).
    pub weight_scale: WeightScale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "warn".to_string() }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        self.level
            .trim()
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.level.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub sale_grid: SaleGridSettings,
    pub logging: LoggingSettings,
}

const DEFAULT_FILE: &str = r#"# Appraise settings

[engine]
# Passes per recalculation cycle (1-16)
max_passes = 3

[sale_grid]
# "percent": column weights sum to 100
# "fraction": column weights sum to 1
weight_scale = "percent"

[logging]
# Used when RUST_LOG is not set: error, warn, info, debug, trace, off
level = "warn"
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("appraise")
            .join("settings.toml")
    }

    /// Parse and validate settings text. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PASSES_LIMIT).contains(&self.engine.max_passes) {
            return Err(ConfigError::MaxPasses(self.engine.max_passes));
        }
        self.logging.level_filter()?;
        Ok(())
    }

    /// Load settings from the default location, falling back to defaults.
    /// Any problem with the file is handed back so the caller can report it
    /// once logging is up.
    pub fn load() -> (Self, Option<ConfigError>) {
        Self::load_or_default(&Self::config_path())
    }

    fn load_or_default(path: &Path) -> (Self, Option<ConfigError>) {
        if !path.exists() {
            return (Self::default(), Self::create_default_file(path).err());
        }
        match Self::load_from(path) {
            Ok(settings) => (settings, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let text = toml::to_string_pretty(self)?;
        write_file(path, &text)
    }

    /// Engine options these settings describe.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_passes: self.engine.max_passes,
            weight_scale: self.sale_grid.weight_scale,
        }
    }

    /// Create default settings file with comments
    fn create_default_file(path: &Path) -> Result<(), ConfigError> {
        write_file(path, DEFAULT_FILE)
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, text).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_file_matches_defaults() {
        let settings = Settings::from_toml(DEFAULT_FILE).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.engine_options(), EngineOptions::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings = Settings::from_toml("[sale_grid]\nweight_scale = \"fraction\"\n").unwrap();
        assert_eq!(settings.sale_grid.weight_scale, WeightScale::Fraction);
        assert_eq!(settings.engine.max_passes, 3);
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn test_validate_rejects_out_of_range_passes() {
        assert!(matches!(
            Settings::from_toml("[engine]\nmax_passes = 0\n"),
            Err(ConfigError::MaxPasses(0))
        ));
        assert!(matches!(
            Settings::from_toml("[engine]\nmax_passes = 17\n"),
            Err(ConfigError::MaxPasses(17))
        ));
        assert!(Settings::from_toml("[engine]\nmax_passes = 16\n").is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let err = Settings::from_toml("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::LogLevel(ref l) if l == "loud"));
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(
            Settings::from_toml("[sale_grid]\nweight_scale = \"per-mille\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.engine.max_passes = 5;
        settings.logging.level = "debug".into();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.engine_options().max_passes, 5);
        assert_eq!(loaded.logging.level_filter().unwrap(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_save_refuses_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::default();
        settings.engine.max_passes = 0;
        assert!(settings.save_to(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Settings::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_or_default_reports_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[engine]\nmax_passes = 99\n").unwrap();

        let (settings, problem) = Settings::load_or_default(&path);
        assert_eq!(settings, Settings::default());
        assert!(matches!(problem, Some(ConfigError::MaxPasses(99))));
    }

    #[test]
    fn test_load_or_default_writes_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appraise").join("settings.toml");

        let (settings, problem) = Settings::load_or_default(&path);
        assert_eq!(settings, Settings::default());
        assert!(problem.is_none());
        assert!(path.exists());
    }

    #[test]
    fn test_create_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appraise").join("settings.toml");
        Settings::create_default_file(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
    }
}
