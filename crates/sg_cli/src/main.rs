//! StudyGuide CLI - operator tooling for the collaborative editor bridge
//!
//! Usage: studyguide <command> [options]

mod cmd_simulate;

use clap::{Parser, Subcommand};
use sg_collab::{color_for_name, Delta, FileStore, LocalStore};
use sg_common::telemetry::{init_tracing, LogFormat};
use sg_common::{StudyGuideError, EXIT_CONFIG_ERROR, EXIT_ERROR};
use sg_config::{Config, LoggingConfig, CONFIG_RELATIVE_PATH};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "studyguide",
    version = "0.1.0",
    about = "StudyGuide collaborative editor tooling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a StudyGuide workspace
    Init,

    /// Run several editors against one in-process room
    Simulate {
        /// Room to join
        #[arg(long)]
        room: Option<String>,

        /// Participants, comma-separated; the first one types
        #[arg(long, value_delimiter = ',', default_value = "alice,bob")]
        users: Vec<String>,

        /// Text typed by the first participant
        #[arg(long)]
        text: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the autosaved snapshot of a room
    Inspect {
        /// Room whose snapshot to read
        #[arg(long)]
        room: Option<String>,

        /// Print the stored delta instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Print the presence colour derived from a display name
    Color {
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (verbose, format) = log_settings(&cli, &workspace_root());
    init_tracing(verbose, format);
    tracing::debug!("StudyGuide CLI started");

    let result = match cli.command {
        Commands::Init => cmd_init(),
        Commands::Simulate {
            room,
            users,
            text,
            json,
        } => cmd_simulate::run(&workspace_root(), room, users, text, json).await,
        Commands::Inspect { room, json } => cmd_inspect(room, json),
        Commands::Color { name } => cmd_color(&name),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

//
// Helper functions
//

/// Workspace root: `STUDYGUIDE_ROOT` if set, else the current directory
fn workspace_root() -> PathBuf {
    std::env::var_os("STUDYGUIDE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Flags switch logging options on; `[logging]` applies otherwise.
///
/// A broken config falls back to defaults here and is reported by the command.
fn log_settings(cli: &Cli, root: &Path) -> (bool, LogFormat) {
    let logging = Config::load(root)
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingConfig::default());
    (
        cli.verbose || logging.verbose,
        LogFormat::from_json_flag(cli.log_json || logging.json),
    )
}

fn load_config(root: &Path) -> anyhow::Result<Config> {
    Ok(Config::load(root)?)
}

fn exit_code(error: &anyhow::Error) -> i32 {
    let config_error = error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StudyGuideError>(),
            Some(StudyGuideError::ConfigError(_))
        )
    });
    if config_error {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_ERROR
    }
}

//
// Command implementations
//

fn cmd_init() -> anyhow::Result<()> {
    use std::fs;

    let root = workspace_root();
    let studyguide_dir = root.join(".studyguide");

    if !studyguide_dir.exists() {
        fs::create_dir_all(&studyguide_dir)?;
        eprintln!("✓ Created .studyguide/");
    } else {
        eprintln!("✓ .studyguide/ already exists");
    }

    let config_path = root.join(CONFIG_RELATIVE_PATH);
    if !config_path.exists() {
        let config = Config::default();
        let content = format!(
            "# StudyGuide Configuration\n\n{}",
            config.to_toml_string()?
        );
        fs::write(&config_path, content)?;
        eprintln!("✓ Created {}", CONFIG_RELATIVE_PATH);
    } else {
        eprintln!("✓ {} already exists", CONFIG_RELATIVE_PATH);
    }

    let config = load_config(&root)?;
    let autosave_dir = config.autosave_dir();
    if !autosave_dir.exists() {
        fs::create_dir_all(&autosave_dir)?;
        eprintln!("✓ Created {}", config.autosave.dir.display());
    }

    eprintln!("✅ Workspace initialized");
    Ok(())
}

fn cmd_inspect(room: Option<String>, json: bool) -> anyhow::Result<()> {
    let config = load_config(&workspace_root())?;
    let room_id = room.unwrap_or_else(|| config.editor.default_room.clone());

    let store = FileStore::new(config.autosave_dir());
    let key = sg_collab::storage::storage_key(&config.autosave.key_prefix, &room_id);
    tracing::debug!(key = %key, dir = ?store.dir(), "Reading snapshot");

    let Some(raw) = store.get_item(&key)? else {
        return Err(StudyGuideError::SnapshotNotFound { room_id }.into());
    };
    let contents: Delta = serde_json::from_str(&raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&contents)?);
    } else {
        println!("{}", contents.plain_text());
    }
    Ok(())
}

fn cmd_color(name: &str) -> anyhow::Result<()> {
    let config = load_config(&workspace_root())?;
    println!(
        "{}",
        color_for_name(name, config.presence.saturation, config.presence.lightness)
    );
    Ok(())
}
