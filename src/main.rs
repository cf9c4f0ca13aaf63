mod categorizer;
mod cli;
mod db;
mod error;
mod feed;
mod fmt;
mod guard;
mod lock;
mod logging;
mod matcher;
mod merger;
mod models;
mod patterns;
mod settings;
mod staging;
mod sync;

use clap::Parser;

use cli::{AccountsCommands, Cli, Commands, ImportsCommands, LedgerCommands, PatternsCommands};

fn main() {
    let cli = Cli::parse();

    let log_file = match cli.command {
        Commands::Init { .. } => None,
        _ => logging::init(&settings::load_settings()),
    };

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Status => cli::status::run(),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                account_type,
                institution,
                bank_account_id,
            } => cli::accounts::add(
                &name,
                &account_type,
                institution.as_deref(),
                bank_account_id.as_deref(),
            ),
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::Link {
                name,
                bank_account_id,
            } => cli::accounts::link(&name, &bank_account_id),
        },
        Commands::Patterns { command } => match command {
            PatternsCommands::Add { pattern } => cli::patterns::add(&pattern),
            PatternsCommands::List => cli::patterns::list(),
            PatternsCommands::Delete { id } => cli::patterns::delete(id),
        },
        Commands::Ledger { command } => match command {
            LedgerCommands::Add {
                kind,
                date,
                amount,
                status,
                description,
                from,
                to,
            } => cli::ledger::add(&cli::ledger::ManualEntry {
                kind: &kind,
                date: &date,
                amount: &amount,
                status: &status,
                description: &description,
                from: from.as_deref(),
                to: to.as_deref(),
            }),
            LedgerCommands::List { status, limit } => cli::ledger::list(status.as_deref(), limit),
        },
        Commands::Sync { file } => cli::sync::run(&file, log_file.as_deref()),
        Commands::Imports { command } => match command {
            ImportsCommands::List { limit } => cli::imports::list(limit),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
