use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the callplan binary.
///
/// Loaded from `~/.callplan/config.toml` by default. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallplanConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl CallplanConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CallplanConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite file.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.callplan/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Mode used when the caller does not pass one: "auto" or "manual".
    pub default_mode: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_mode: "auto".to_string(),
        }
    }
}

/// Decision oracle endpoint. An empty endpoint disables the oracle and
/// every decision comes from the keyword fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: "default".to_string(),
            timeout_secs: 30,
        }
    }
}

impl OracleConfig {
    pub fn is_enabled(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

/// Tool dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Directory that receives email, callback, document and CRM artifacts.
    pub output_dir: String,
    /// Notifications allowed per minute before dispatch is refused.
    pub max_notifications_per_minute: u32,
    /// Delay applied to callbacks that arrive without a schedule.
    pub callback_delay_hours: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            output_dir: "~/.callplan/artifacts".to_string(),
            max_notifications_per_minute: 10,
            callback_delay_hours: 24,
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallplanError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = CallplanConfig::default();
        assert_eq!(config.general.data_dir, "~/.callplan/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.execution.default_mode, "auto");
        assert!(!config.oracle.is_enabled());
        assert_eq!(config.oracle.timeout_secs, 30);
        assert_eq!(config.dispatch.max_notifications_per_minute, 10);
        assert_eq!(config.dispatch.callback_delay_hours, 24);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/callplan"
log_level = "debug"

[oracle]
endpoint = "http://localhost:8080/decide"
model = "planner-v2"

[dispatch]
output_dir = "/srv/callplan/out"
max_notifications_per_minute = 3
"#;
        let file = create_temp_config(content);
        let config = CallplanConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/callplan");
        assert_eq!(config.general.log_level, "debug");
        assert!(config.oracle.is_enabled());
        assert_eq!(config.oracle.model, "planner-v2");
        // Unset keys keep their defaults.
        assert_eq!(config.oracle.timeout_secs, 30);
        assert_eq!(config.dispatch.max_notifications_per_minute, 3);
        assert_eq!(config.dispatch.callback_delay_hours, 24);
        assert_eq!(config.execution.default_mode, "auto");
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[general\ndata_dir = ");
        let err = CallplanConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, CallplanError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = CallplanConfig::load_or_default(Path::new("/nonexistent/callplan.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CallplanConfig::default();
        config.execution.default_mode = "manual".to_string();
        config.dispatch.callback_delay_hours = 48;
        config.save(&path).unwrap();

        let loaded = CallplanConfig::load(&path).unwrap();
        assert_eq!(loaded.execution.default_mode, "manual");
        assert_eq!(loaded.dispatch.callback_delay_hours, 48);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        let expanded = expand_home("~/data");
        assert!(expanded.ends_with("data"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
