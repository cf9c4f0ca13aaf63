use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::patterns::{add_pattern, delete_pattern, list_patterns};

pub fn add(pattern: &str) -> Result<()> {
    let conn = open_db()?;
    let id = add_pattern(&conn, pattern)?;
    println!("Added pattern {id}: '{}'", pattern.trim());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern"]);
    for p in list_patterns(&conn)? {
        table.add_row(vec![Cell::new(p.id), Cell::new(p.pattern)]);
    }
    println!("Patterns (tried in this order)\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    let pattern = delete_pattern(&conn, id)?;
    println!("Deleted pattern {id}: '{pattern}'");
    Ok(())
}
