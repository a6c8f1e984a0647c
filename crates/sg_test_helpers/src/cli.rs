//! CLI command builders for tests
//!
//! Commands come with a clean environment so user settings and log output
//! do not leak into assertions.

use assert_cmd::Command;

/// Get a Command for the `studyguide` binary with clean environment
///
/// Pre-configured with `RUST_LOG=error` and without `STUDYGUIDE_ROOT`.
///
/// # Example
///
/// ```rust,no_run
/// use sg_test_helpers::cli::studyguide_command;
///
/// studyguide_command()
///     .arg("--version")
///     .assert()
///     .success();
/// ```
pub fn studyguide_command() -> Command {
    command_for("studyguide")
}

/// Get a Command for a specific binary with clean environment
#[allow(deprecated)]
pub fn command_for(bin_name: &str) -> Command {
    let mut cmd = Command::cargo_bin(bin_name)
        .unwrap_or_else(|_| panic!("Failed to find {} binary", bin_name));
    cmd.env("RUST_LOG", "error");
    cmd.env_remove("STUDYGUIDE_ROOT"); // Don't use user's workspace
    cmd
}
