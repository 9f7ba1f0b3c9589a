//! Tally CLI - Interactive command-line client
//!
//! Runs a local-first sandbox session over a RocksDB operation log.
//!
//! Usage:
//!   tally --account alice.json
//!   tally --account alice.json --config tally.toml --data-dir ./alice-data

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::storage::RocksStore;
use tally_core::{Engine, SessionMode};
use tracing::info;

mod account;
mod commands;
mod config;
mod ui;

use account::AccountManager;
use commands::CommandHandler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to account file (will be created if it doesn't exist)
    #[arg(short, long)]
    account: PathBuf,

    /// Engine config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    // Print banner with version
    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", format!("  {}", tally_core::version::version_string()).bright_cyan().bold());
    println!("{}", "  Local-First Shared Expenses".bright_white());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    // Load or create account
    let mut account_mgr = AccountManager::new(args.account.clone());
    let account = account_mgr.load_or_create()?;

    let mut config = config::load(args.config.as_deref())?;
    config.author_id = Some(account.device_id.clone());
    if let Some(data_dir) = args.data_dir {
        config.storage_path = data_dir;
    } else if args.config.is_none() {
        // Use account filename (without extension) as the data dir name
        let account_name = args
            .account
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data");
        config.storage_path = PathBuf::from(format!("{}-data", account_name));
    }

    println!("{} {}", "Account:".bright_green(), account_mgr.username());
    println!("{} {}", "Device:".bright_green(), account.device_id);
    println!("{} {}", "Data:".bright_green(), config.storage_path.display());
    println!();

    info!("Opening sandbox session with config: {:?}", config);
    let store = RocksStore::open(&config.storage_path)
        .with_context(|| format!("Failed to open log at {}", config.storage_path.display()))?;
    let engine = Engine::open(SessionMode::Sandbox, config, Arc::new(store), None).await?;

    let mut handler = CommandHandler::new(engine, account.clone());
    handler.ensure_user().await?;

    // Interactive REPL
    let mut rl = DefaultEditor::new()?;
    let history_file = args.account.with_extension("history");
    let _ = rl.load_history(&history_file);

    println!("{}", "Type 'help' for available commands, 'quit' to exit".bright_yellow());
    println!();

    loop {
        let prompt = format!("{}> ", handler.prompt().bright_cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match line {
                    "quit" | "exit" => {
                        println!("{}", "Goodbye!".bright_green());
                        break;
                    }
                    "help" => {
                        ui::print_help();
                    }
                    _ => {
                        if let Err(e) = handler.handle_command(line).await {
                            ui::print_error(&format!("{:#}", e));
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Err(err) => {
                ui::print_error(&format!("Error: {}", err));
                break;
            }
        }
    }

    // Save history
    let _ = rl.save_history(&history_file);

    Ok(())
}
