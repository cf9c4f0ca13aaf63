use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("No linked accounts: none of the feed's bank accounts are linked to a ledger account")]
    NoLinkedAccounts,

    #[error("Invalid feed: {0}")]
    InvalidFeed(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Account {0} is being synced by another run")]
    AccountLocked(i64),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl LedgerError {
    /// True when the store itself is gone or unusable, as opposed to a
    /// problem with a single row. The batch stops between transactions on these.
    pub fn is_store_fatal(&self) -> bool {
        use rusqlite::ErrorCode;
        match self {
            Self::Db(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::NotADatabase
                    | ErrorCode::ReadOnly
                    | ErrorCode::DiskFull
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
