use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::db::{account_id_by_name, list_accounts};
use crate::error::Result;

pub fn add(
    name: &str,
    account_type: &str,
    institution: Option<&str>,
    bank_account_id: Option<&str>,
) -> Result<()> {
    let conn = open_db()?;
    conn.execute(
        "INSERT INTO accounts (name, account_type, institution, bank_account_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![name, account_type, institution, bank_account_id],
    )?;
    println!("Added account: {name}");
    Ok(())
}

pub fn link(name: &str, bank_account_id: &str) -> Result<()> {
    let conn = open_db()?;
    let id = account_id_by_name(&conn, name)?;
    conn.execute(
        "UPDATE accounts SET bank_account_id = ?1 WHERE id = ?2",
        rusqlite::params![bank_account_id, id],
    )?;
    println!("Linked {name} \u{2192} {bank_account_id}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Institution", "Bank Account"]);
    for acct in list_accounts(&conn)? {
        table.add_row(vec![
            Cell::new(acct.id),
            Cell::new(acct.name),
            Cell::new(acct.account_type),
            Cell::new(acct.institution.unwrap_or_default()),
            Cell::new(acct.bank_account_id.unwrap_or_default()),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
