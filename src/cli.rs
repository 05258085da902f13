//! CLI commands and argument parsing.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use crate::commands;
use crate::config::APP_NAME;
use crate::fileio;
use crate::lifecycle;
use crate::vault::StorePaths;

/// pwm - Securely creates/stores usernames and passwords for multiple
/// items (such as websites).
#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(disable_help_subcommand = true)]
#[command(about = "Securely creates/stores usernames and passwords for multiple items (such as websites).")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI verbs.
#[derive(Subcommand)]
pub enum Commands {
    /// Prints this help message and exits.
    Help,

    /// Initializes the system.  This must be called once before any other
    /// commands.
    Init,

    /// Destroys all information for the system.
    Destroy,

    /// List all available items.
    List,

    /// Configure the system.
    Config,

    /// Creates a new item.
    Create { item_name: String },

    /// Gets the stored info for the item.
    Get { item_name: String },

    /// Updates the info for the item.
    Update { item_name: String },

    /// Deletes the item.
    Delete { item_name: String },
}

/// Parses the command line and runs the selected verb.
pub fn run() -> Result<()> {
    let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    lifecycle::init()?;

    let cli = Cli::parse();

    let paths = StorePaths::from_home()?;

    // A crashed rewrite may have left a temp file behind; it was never the
    // commit point, so it is safe to drop.
    if fileio::exists(paths.temp()).unwrap_or(false) {
        let _ = std::fs::remove_file(paths.temp());
    }

    match cli.command {
        Some(Commands::Init) => commands::run_init(&paths),
        Some(Commands::Destroy) => commands::run_destroy(&paths),
        Some(Commands::List) => commands::run_list(&paths),
        Some(Commands::Config) => commands::run_config(&paths),
        Some(Commands::Create { item_name }) => commands::run_create(&paths, &item_name),
        Some(Commands::Get { item_name }) => commands::run_get(&paths, &item_name),
        Some(Commands::Update { item_name }) => commands::run_update(&paths, &item_name),
        Some(Commands::Delete { item_name }) => commands::run_delete(&paths, &item_name),
        Some(Commands::Help) | None => {
            Cli::command().print_help().ok();
            std::process::exit(1);
        }
    }
}
