use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

pub mod commands;

use self::commands::{DeleteArgs, EditArgs, IdArgs, ImportArgs, UpdateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "feedback",
    version,
    about = "Keyboard-first editor for product feedback boards",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Feedback id to open in the edit screen (shorthand for `edit <id>`)
    #[arg()]
    pub id: Option<String>,

    /// Override the config file location (takes precedence over FEEDBACK_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over FEEDBACK_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive edit screen for one feedback
    Edit(EditArgs),
    /// Print one feedback with its status
    Show(IdArgs),
    /// Print every status column of the board (default)
    List,
    /// Edit a feedback without the interactive screen
    Update(UpdateArgs),
    /// Delete a feedback after confirmation
    Delete(DeleteArgs),
    /// Toggle your upvote on a feedback
    Upvote(IdArgs),
    /// Import feedback from a JSON board file or stdin
    Import(ImportArgs),
    /// Print the whole board as JSON
    Export,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;
    tracing::debug!(db = %storage.database_path().display(), "storage ready");

    let config = Arc::new(config);
    let command = match (cli.command, cli.id) {
        (Some(command), _) => command,
        (None, Some(id)) => Commands::Edit(EditArgs { id }),
        (None, None) => Commands::List,
    };
    match command {
        Commands::Edit(args) => commands::run_edit(config, storage, args),
        Commands::Show(args) => emit(commands::run_show(&storage, &args)),
        Commands::List => emit(commands::run_list(&storage)),
        Commands::Update(args) => emit(commands::run_update(&config, &storage, &args)),
        Commands::Delete(args) => emit(commands::run_delete(
            &config,
            &storage,
            &args,
            commands::confirm_on_terminal,
        )),
        Commands::Upvote(args) => emit(commands::run_upvote(&storage, &args)),
        Commands::Import(args) => emit(commands::run_import(&storage, &args)),
        Commands::Export => emit(storage.export_collection().map(|json| json + "\n")),
    }
}

fn emit(output: Result<String>) -> Result<()> {
    print!("{}", output?);
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn bare_id_opens_editor() {
        let cli = Cli::try_parse_from(["feedback", "7"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.id.as_deref(), Some("7"));
    }

    #[test]
    fn subcommands_accept_global_flags() {
        let cli = Cli::try_parse_from([
            "feedback",
            "update",
            "3",
            "--status",
            "in-progress",
            "--data-dir",
            "/tmp/board",
        ])
        .expect("parse");
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/board")));
        assert_matches!(cli.command, Some(Commands::Update(args)) if args.id == 3);
    }
}
