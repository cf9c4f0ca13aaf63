use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::staging;

pub fn list(limit: usize) -> Result<()> {
    let conn = open_db()?;
    let rows = staging::recent(&conn, limit)?;
    if rows.is_empty() {
        println!("No bank-feed rows staged yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "External ID", "Date", "Booking", "Amount", "Currency", "Description", "Result", "Ledger",
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(&row.external_id),
            Cell::new(row.date),
            Cell::new(row.booking_status),
            Cell::new(money(row.amount)),
            Cell::new(&row.currency),
            Cell::new(&row.description),
            Cell::new(row.disposition),
            Cell::new(row.ledger_ref.map(|id| id.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Staged imports\n{table}");
    Ok(())
}
