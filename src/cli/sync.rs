use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::categorizer::uncategorized;
use crate::cli::open_db;
use crate::error::Result;
use crate::settings::load_settings;
use crate::sync::{sync_feed, SyncContext, SyncSummary};

pub fn run(file: &str, log_file: Option<&Path>) -> Result<()> {
    let settings = load_settings();
    let file_path = PathBuf::from(file);
    let payload = std::fs::read_to_string(&file_path)?;
    let mut conn = open_db()?;
    std::fs::create_dir_all(settings.lock_dir())?;

    let ctx = SyncContext {
        source: file_path.display().to_string(),
        lock_dir: settings.lock_dir(),
        classifier: &uncategorized,
    };
    let summary = sync_feed(&mut conn, &payload, &ctx)?;
    print_summary(&summary);

    if let Some(path) = log_file {
        println!("Log: {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &SyncSummary) {
    println!(
        "{} created, {} updated, {} duplicates",
        summary.created.to_string().green(),
        summary.updated.to_string().green(),
        summary.duplicates
    );
    if summary.failed > 0 {
        println!("{}", format!("{} failed (rolled back, see log)", summary.failed).red());
    }
    if summary.dropped > 0 {
        println!("{}", format!("{} feed rows dropped as malformed", summary.dropped).yellow());
    }
    if summary.locked > 0 {
        println!(
            "{}",
            format!("{} skipped: account locked by another sync", summary.locked).yellow()
        );
    }
    if !summary.unlinked_accounts.is_empty() {
        println!(
            "{} {}",
            "Unlinked feed accounts skipped:".yellow(),
            summary.unlinked_accounts.join(", ")
        );
    }
    if let Some(reason) = &summary.aborted {
        println!("{} {reason}", "Sync aborted:".red().bold());
    }
}
