//! Configuration management for StudyGuide
//!
//! This crate handles loading and validating `.studyguide/config.toml`

use sg_common::{Result, StudyGuideError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location of the config file relative to the workspace root
pub const CONFIG_RELATIVE_PATH: &str = ".studyguide/config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace root path (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Editor mount settings
    #[serde(default)]
    pub editor: EditorConfig,

    /// Autosave snapshot settings
    #[serde(default)]
    pub autosave: AutosaveConfig,

    /// Presence colour settings
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Editor configuration ([editor])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_mount_id")]
    pub mount_id: String,

    /// Room used when the mount point carries no `data-room-id`
    #[serde(default = "default_room")]
    pub default_room: String,

    /// Name used when the mount point carries no `data-user-display`
    #[serde(default = "default_display_name")]
    pub default_display_name: String,

    /// Name of the shared text field inside the replicated document
    #[serde(default = "default_text_field")]
    pub text_field: String,
}

fn default_mount_id() -> String {
    "study-guide-editor".to_string()
}
fn default_room() -> String {
    "studyguide-default".to_string()
}
fn default_display_name() -> String {
    "anonymous".to_string()
}
fn default_text_field() -> String {
    "quill".to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            mount_id: default_mount_id(),
            default_room: default_room(),
            default_display_name: default_display_name(),
            text_field: default_text_field(),
        }
    }
}

/// Autosave configuration ([autosave])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Directory used by the file-backed store, relative to the root
    #[serde(default = "default_autosave_dir")]
    pub dir: PathBuf,
}

fn default_true() -> bool {
    true
}
fn default_key_prefix() -> String {
    "studyguide:".to_string()
}
fn default_autosave_dir() -> PathBuf {
    PathBuf::from(".studyguide/autosave")
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: default_key_prefix(),
            dir: default_autosave_dir(),
        }
    }
}

/// Presence configuration ([presence])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// HSL saturation percentage for participant colours
    #[serde(default = "default_saturation")]
    pub saturation: u8,

    /// HSL lightness percentage for participant colours
    #[serde(default = "default_lightness")]
    pub lightness: u8,
}

fn default_saturation() -> u8 {
    70
}
fn default_lightness() -> u8 {
    50
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            saturation: default_saturation(),
            lightness: default_lightness(),
        }
    }
}

/// Logging configuration ([logging])
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from workspace root
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_RELATIVE_PATH);

        if !config_path.exists() {
            return Ok(Self {
                root: workspace_root.to_path_buf(),
                ..Default::default()
            });
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            StudyGuideError::ConfigError(format!("Failed to read config: {}", e))
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| {
            StudyGuideError::ConfigError(format!("Failed to parse config: {}", e))
        })?;

        config.root = workspace_root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the bridge cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.editor.text_field.trim().is_empty() {
            return Err(StudyGuideError::ConfigError(
                "editor.text_field cannot be empty".to_string(),
            ));
        }
        if self.editor.default_room.trim().is_empty() {
            return Err(StudyGuideError::ConfigError(
                "editor.default_room cannot be empty".to_string(),
            ));
        }
        if self.autosave.key_prefix.is_empty() {
            return Err(StudyGuideError::ConfigError(
                "autosave.key_prefix cannot be empty".to_string(),
            ));
        }
        if self.presence.saturation > 100 || self.presence.lightness > 100 {
            return Err(StudyGuideError::ConfigError(
                "presence saturation/lightness are percentages (0-100)".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute directory of the file-backed autosave store
    pub fn autosave_dir(&self) -> PathBuf {
        if self.autosave.dir.is_absolute() {
            self.autosave.dir.clone()
        } else {
            self.root.join(&self.autosave.dir)
        }
    }

    /// Render the configuration back to TOML (used by `studyguide init`)
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            StudyGuideError::ConfigError(format!("Failed to serialize config: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();

        assert_eq!(config.root, temp.path());
        assert_eq!(config.editor.default_room, "studyguide-default");
        assert_eq!(config.editor.default_display_name, "anonymous");
        assert_eq!(config.editor.text_field, "quill");
        assert_eq!(config.autosave.key_prefix, "studyguide:");
        assert!(config.autosave.enabled);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(CONFIG_RELATIVE_PATH)
            .write_str("[editor]\ndefault_room = \"cs-2150\"\n\n[logging]\nverbose = true\n")
            .unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.editor.default_room, "cs-2150");
        assert_eq!(config.editor.mount_id, "study-guide-editor");
        assert!(config.logging.verbose);
        assert_eq!(config.presence.saturation, 70);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(CONFIG_RELATIVE_PATH)
            .write_str("[editor]\ntext_field = \"\"\n")
            .unwrap();

        let err = Config::load(temp.path()).unwrap_err();
        assert!(err.to_string().contains("text_field"));
    }

    #[test]
    fn test_autosave_dir_is_rooted() {
        let config = Config {
            root: PathBuf::from("/srv/site"),
            ..Default::default()
        };
        assert_eq!(
            config.autosave_dir(),
            PathBuf::from("/srv/site/.studyguide/autosave")
        );
    }

    #[test]
    fn test_toml_round_trip_through_load() {
        let temp = assert_fs::TempDir::new().unwrap();
        let rendered = Config::default().to_toml_string().unwrap();
        temp.child(CONFIG_RELATIVE_PATH).write_str(&rendered).unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.editor.text_field, "quill");
    }
}
