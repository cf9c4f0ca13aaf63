use rusqlite::OptionalExtension;

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_path().display());
    println!("Database:   {}", db_path.display());
    println!("Log file:   {}", settings.log_file().display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `homeledger init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
    let accounts = count("SELECT count(*) FROM accounts")?;
    let linked = count("SELECT count(*) FROM accounts WHERE bank_account_id IS NOT NULL")?;
    let forecast = count("SELECT count(*) FROM transactions WHERE status = 1")?;
    let processing = count("SELECT count(*) FROM transactions WHERE status = 2")?;
    let complete = count("SELECT count(*) FROM transactions WHERE status = 3")?;
    let staged = count("SELECT count(*) FROM raw_imports")?;
    let patterns = count("SELECT count(*) FROM match_patterns WHERE is_active = 1")?;

    println!();
    println!("Accounts:      {accounts} ({linked} linked)");
    println!("Forecast:      {forecast}");
    println!("Processing:    {processing}");
    println!("Complete:      {complete}");
    println!("Staged rows:   {staged}");
    println!("Patterns:      {patterns}");

    let last_fetch: Option<(String, String, i64, i64, i64)> = conn
        .query_row(
            "SELECT source, started_at, created, updated, duplicates \
             FROM fetches ORDER BY id DESC LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()?;
    if let Some((source, at, created, updated, duplicates)) = last_fetch {
        println!();
        println!("Last sync:     {at} from {source}");
        println!("               {created} created, {updated} updated, {duplicates} duplicates");
    }
    Ok(())
}
