//! Shared test utilities for the study guide test suites
//!
//! # Modules
//!
//! - [`workspace`]: Temporary workspaces with a `.studyguide` directory
//! - [`cli`]: Command builders with pre-configured environments
//! - [`logging`]: Test logging configuration
//! - [`assertions`]: Domain-specific assertion helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use sg_test_helpers::prelude::*;
//!
//! fn my_test() {
//!     let workspace = init_workspace();
//!
//!     studyguide_command()
//!         .current_dir(workspace.path())
//!         .args(["color", "alice"])
//!         .assert()
//!         .success();
//! }
//! ```

pub mod workspace;
pub mod cli;
pub mod logging;
pub mod assertions;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::workspace::{temp_dir, init_workspace, workspace_with_config};
    pub use crate::cli::{studyguide_command, command_for};
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::assertions::*;
}
