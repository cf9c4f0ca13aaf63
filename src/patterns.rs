use rusqlite::{Connection, OptionalExtension};

use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    pub id: i64,
    pub pattern: String,
}

pub fn add_pattern(conn: &Connection, pattern: &str) -> Result<i64> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(LedgerError::InvalidValue { field: "pattern", value: String::new() });
    }
    let existing: Option<(i64, bool)> = conn
        .query_row(
            "SELECT id, is_active FROM match_patterns WHERE pattern = ?1",
            [pattern],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match existing {
        Some((_, true)) => Err(LedgerError::Other(format!("Pattern '{pattern}' already exists"))),
        Some((id, false)) => {
            conn.execute("UPDATE match_patterns SET is_active = 1 WHERE id = ?1", [id])?;
            Ok(id)
        }
        None => {
            conn.execute("INSERT INTO match_patterns (pattern) VALUES (?1)", [pattern])?;
            Ok(conn.last_insert_rowid())
        }
    }
}

/// Active patterns in the order the matcher tries them.
pub fn list_patterns(conn: &Connection) -> Result<Vec<MatchPattern>> {
    let mut stmt =
        conn.prepare("SELECT id, pattern FROM match_patterns WHERE is_active = 1 ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MatchPattern {
                id: row.get(0)?,
                pattern: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn active_patterns(conn: &Connection) -> Result<Vec<String>> {
    Ok(list_patterns(conn)?.into_iter().map(|p| p.pattern).collect())
}

pub fn delete_pattern(conn: &Connection, id: i64) -> Result<String> {
    let row: Option<(String, bool)> = conn
        .query_row(
            "SELECT pattern, is_active FROM match_patterns WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        None => Err(LedgerError::Other(format!("No pattern with ID {id}"))),
        Some((_, false)) => Err(LedgerError::Other(format!("Pattern {id} is already inactive"))),
        Some((pattern, true)) => {
            conn.execute("UPDATE match_patterns SET is_active = 0 WHERE id = ?1", [id])?;
            Ok(pattern)
        }
    }
}
