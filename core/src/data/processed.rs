//! Processed message rows
//!
//! Raw access to the `processed_messages` table. Callers own transaction
//! boundaries: every function takes a `Connection` (a `Transaction` derefs to
//! one) and issues single statements.

use rusqlite::{Connection, OptionalExtension, params};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp
///
/// Returns 0 if system clock is before Unix epoch.
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One row of `processed_messages`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedMessageRow {
    pub message_id: String,
    pub insertion_time: i64,
    pub sender: Option<String>,
    pub sequence_number: Option<i64>,
    pub last_sequence_number: Option<i64>,
    pub version: i32,
}

fn parse_processed_row(row: &rusqlite::Row) -> rusqlite::Result<ProcessedMessageRow> {
    Ok(ProcessedMessageRow {
        message_id: row.get(0)?,
        insertion_time: row.get(1)?,
        sender: row.get(2)?,
        sequence_number: row.get(3)?,
        last_sequence_number: row.get(4)?,
        version: row.get(5)?,
    })
}

/// Insert a new row
///
/// Fails with a constraint violation if `message_id` already exists.
pub fn insert_processed_message(
    conn: &Connection,
    row: &ProcessedMessageRow,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO processed_messages
         (message_id, insertion_time, sender, sequence_number, last_sequence_number, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.message_id,
            row.insertion_time,
            row.sender,
            row.sequence_number,
            row.last_sequence_number,
            row.version,
        ],
    )?;
    Ok(())
}

/// Get a row by message id
pub fn get_processed_message(
    conn: &Connection,
    message_id: &str,
) -> rusqlite::Result<Option<ProcessedMessageRow>> {
    conn.query_row(
        "SELECT message_id, insertion_time, sender, sequence_number, last_sequence_number, version
         FROM processed_messages WHERE message_id = ?1",
        [message_id],
        parse_processed_row,
    )
    .optional()
}

/// Set `last_sequence_number` on an existing row in one statement
///
/// Returns whether a row was affected.
pub fn update_last_sequence_number(
    conn: &Connection,
    message_id: &str,
    last_sequence_number: Option<i64>,
) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE processed_messages SET last_sequence_number = ?1 WHERE message_id = ?2",
        params![last_sequence_number, message_id],
    )?;
    Ok(updated > 0)
}

/// Total number of processed message rows
pub fn count_processed_messages(conn: &Connection) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM processed_messages", [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

/// Number of rows whose id starts with `prefix`
pub fn count_processed_with_prefix(conn: &Connection, prefix: &str) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM processed_messages WHERE substr(message_id, 1, length(?1)) = ?1",
        [prefix],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::create_all_tables;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_all_tables(&conn).unwrap();
        conn
    }

    fn row(id: &str) -> ProcessedMessageRow {
        ProcessedMessageRow {
            message_id: id.to_string(),
            insertion_time: 1704067200,
            sender: None,
            sequence_number: None,
            last_sequence_number: None,
            version: 1,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup_db();
        let mut r = row("K1");
        r.sender = Some("ab".repeat(32));
        r.sequence_number = Some(7);

        insert_processed_message(&conn, &r).unwrap();
        assert_eq!(get_processed_message(&conn, "K1").unwrap(), Some(r));
    }

    #[test]
    fn test_get_missing() {
        let conn = setup_db();
        assert!(get_processed_message(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_is_constraint_violation() {
        let conn = setup_db();
        insert_processed_message(&conn, &row("K1")).unwrap();

        let err = insert_processed_message(&conn, &row("K1")).unwrap_err();
        assert_eq!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }

    #[test]
    fn test_update_last_sequence_number() {
        let conn = setup_db();
        insert_processed_message(&conn, &row("K1")).unwrap();

        assert!(update_last_sequence_number(&conn, "K1", Some(42)).unwrap());
        let stored = get_processed_message(&conn, "K1").unwrap().unwrap();
        assert_eq!(stored.last_sequence_number, Some(42));
        assert_eq!(stored.insertion_time, row("K1").insertion_time);

        assert!(!update_last_sequence_number(&conn, "missing", Some(1)).unwrap());
    }

    #[test]
    fn test_counts() {
        let conn = setup_db();
        assert_eq!(count_processed_messages(&conn).unwrap(), 0);

        insert_processed_message(&conn, &row("SE-A-1")).unwrap();
        insert_processed_message(&conn, &row("SE-B-1")).unwrap();
        insert_processed_message(&conn, &row("SD-A-1")).unwrap();
        // `_` in the prefix is not a wildcard
        insert_processed_message(&conn, &row("S_-A-1")).unwrap();

        assert_eq!(count_processed_messages(&conn).unwrap(), 4);
        assert_eq!(count_processed_with_prefix(&conn, "SE-").unwrap(), 2);
        assert_eq!(count_processed_with_prefix(&conn, "S_-").unwrap(), 1);
    }

    #[test]
    fn test_current_timestamp_is_recent() {
        // 2024-01-01
        assert!(current_timestamp() > 1704067200);
    }
}
