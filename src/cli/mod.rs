pub mod accounts;
pub mod imports;
pub mod init;
pub mod ledger;
pub mod patterns;
pub mod status;
pub mod sync;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{LedgerError, Result};
use crate::settings::load_settings;

/// Open the configured database, refusing to create one implicitly.
pub(crate) fn open_db() -> Result<Connection> {
    let path = load_settings().db_path();
    if !path.exists() {
        return Err(LedgerError::Other(format!(
            "Database not found at {}. Run `homeledger init` first.",
            path.display()
        )));
    }
    get_connection(&path)
}

#[derive(Parser)]
#[command(name = "homeledger", about = "Home accounts ledger with bank-feed reconciliation.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for homeledger data (default: ~/Documents/homeledger)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show the database location and summary counts.
    Status,
    /// Manage accounts and their bank links.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage description patterns used when matching imported expenses.
    Patterns {
        #[command(subcommand)]
        command: PatternsCommands,
    },
    /// Enter or list ledger transactions.
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },
    /// Reconcile a bank feed (aggregator JSON) into the ledger.
    Sync {
        /// Path to the fetched transactions JSON
        file: String,
    },
    /// Inspect staged bank-feed rows.
    Imports {
        #[command(subcommand)]
        command: ImportsCommands,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Joint Current'
        name: String,
        /// Account type: current, savings, credit_card, cash
        #[arg(long = "type")]
        account_type: String,
        /// Institution name
        #[arg(long)]
        institution: Option<String>,
        /// Aggregator account id whose feed belongs to this account
        #[arg(long = "bank-account-id")]
        bank_account_id: Option<String>,
    },
    /// List all accounts.
    List,
    /// Link an existing account to an aggregator account id.
    Link {
        /// Account name
        name: String,
        /// Aggregator account id
        bank_account_id: String,
    },
}

#[derive(Subcommand)]
pub enum PatternsCommands {
    /// Add a pattern (case-insensitive substring).
    Add { pattern: String },
    /// List active patterns in matching order.
    List,
    /// Delete (deactivate) a pattern by ID.
    Delete {
        /// Pattern ID (shown in `homeledger patterns list`)
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Add a manual or forecast transaction.
    Add {
        /// income, expense or transfer
        #[arg(long)]
        kind: String,
        /// Date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Amount (unsigned); 0 for "amount not known yet"
        #[arg(long)]
        amount: String,
        /// forecast, processing or complete
        #[arg(long, default_value = "forecast")]
        status: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Source account name (expense, transfer)
        #[arg(long)]
        from: Option<String>,
        /// Destination account name (income, transfer)
        #[arg(long)]
        to: Option<String>,
    },
    /// List ledger transactions, newest first.
    List {
        /// Only this status: forecast, processing or complete
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum ImportsCommands {
    /// Show the most recently staged rows and what happened to them.
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}
