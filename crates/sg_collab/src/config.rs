//! Configuration for the collaboration bridge

use serde::{Deserialize, Serialize};
use sg_config::Config;
use std::path::Path;

/// Settings one bridge instance runs with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Identifier of the element the editor mounts on
    pub mount_id: String,

    /// Room used when the mount point names none
    pub default_room: String,

    /// Display name used when the mount point names none
    pub default_display_name: String,

    /// Name of the text field in the shared document
    pub text_field: String,

    /// Prefix of the autosave key; the room id is appended
    pub storage_key_prefix: String,

    pub autosave_enabled: bool,

    /// HSL saturation of participant colours
    pub saturation: u8,

    /// HSL lightness of participant colours
    pub lightness: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for BridgeConfig {
    fn from(config: &Config) -> Self {
        Self {
            mount_id: config.editor.mount_id.clone(),
            default_room: config.editor.default_room.clone(),
            default_display_name: config.editor.default_display_name.clone(),
            text_field: config.editor.text_field.clone(),
            storage_key_prefix: config.autosave.key_prefix.clone(),
            autosave_enabled: config.autosave.enabled,
            saturation: config.presence.saturation,
            lightness: config.presence.lightness,
        }
    }
}

impl BridgeConfig {
    /// Load from `<root>/.studyguide/config.toml`, falling back to defaults
    pub fn from_workspace(root: &Path) -> crate::Result<Self> {
        let config = Config::load(root)?;
        Ok(Self::from(&config))
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mount_id.is_empty() {
            anyhow::bail!("mount_id cannot be empty");
        }
        if self.default_room.is_empty() {
            anyhow::bail!("default_room cannot be empty");
        }
        if self.text_field.is_empty() {
            anyhow::bail!("text_field cannot be empty");
        }
        if self.storage_key_prefix.is_empty() {
            anyhow::bail!("storage_key_prefix cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_workspace_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.default_room, "studyguide-default");
        assert_eq!(config.default_display_name, "anonymous");
        assert_eq!(config.text_field, "quill");
        assert_eq!(config.storage_key_prefix, "studyguide:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_field() {
        let config = BridgeConfig {
            text_field: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_workspace_without_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = BridgeConfig::from_workspace(temp.path()).unwrap();
        assert_eq!(config.mount_id, "study-guide-editor");
    }
}
