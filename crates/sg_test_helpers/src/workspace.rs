//! Workspace initialization utilities for tests

use assert_fs::TempDir;
use std::fs;

/// Create a temporary directory, removed when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Initialize a study guide workspace in a temp directory
///
/// Creates `.studyguide/` and its autosave directory.
///
/// # Example
///
/// ```rust
/// use sg_test_helpers::workspace::init_workspace;
///
/// let workspace = init_workspace();
/// assert!(workspace.path().join(".studyguide").exists());
/// ```
pub fn init_workspace() -> TempDir {
    let temp = temp_dir();
    let autosave_dir = temp.path().join(".studyguide").join("autosave");
    fs::create_dir_all(&autosave_dir).expect("Failed to create .studyguide directory");
    temp
}

/// Create a workspace whose `.studyguide/config.toml` holds `config`
///
/// # Example
///
/// ```rust
/// use sg_test_helpers::workspace::workspace_with_config;
///
/// let workspace = workspace_with_config("[editor]\ndefault_room = \"biology\"\n");
/// assert!(workspace.path().join(".studyguide/config.toml").exists());
/// ```
pub fn workspace_with_config(config: &str) -> TempDir {
    let workspace = init_workspace();
    let path = workspace.path().join(".studyguide").join("config.toml");
    fs::write(&path, config).expect("Failed to write config.toml");
    workspace
}
