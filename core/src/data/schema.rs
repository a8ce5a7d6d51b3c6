//! Database schema definitions for the deduplication store

use rusqlite::Connection;

/// Creates all required database tables
pub fn create_all_tables(conn: &Connection) -> rusqlite::Result<()> {
    create_processed_messages_table(conn)?;
    Ok(())
}

/// Processed messages table: one row per deduplication key, ever
///
/// Rows are append-only. The single sanctioned mutation is the
/// `last_sequence_number` column of session-end marker rows.
/// `sender` and `sequence_number` are both set or both NULL.
pub fn create_processed_messages_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS processed_messages (
            message_id TEXT PRIMARY KEY NOT NULL CHECK (length(message_id) <= 64),
            insertion_time INTEGER NOT NULL,
            sender TEXT CHECK (sender IS NULL OR length(sender) <= 64),
            sequence_number INTEGER,
            last_sequence_number INTEGER,
            version INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    Ok(())
}

/// Columns added after the original `(message_id, insertion_time)` layout
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("sender", "TEXT"),
    ("sequence_number", "INTEGER"),
    ("last_sequence_number", "INTEGER"),
    ("version", "INTEGER NOT NULL DEFAULT 1"),
];

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )
}

/// Run database migrations for existing databases
///
/// Upgrades a legacy `processed_messages(message_id, insertion_time)` table.
/// Existing rows get NULL sender columns, read back as "no sender-scope
/// information". Each step checks whether it was already applied.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<usize> {
    let mut applied = 0;
    for (column, definition) in ADDED_COLUMNS {
        if !has_column(conn, "processed_messages", column)? {
            conn.execute(
                &format!(
                    "ALTER TABLE processed_messages ADD COLUMN {} {}",
                    column, definition
                ),
                [],
            )?;
            applied += 1;
        }
    }
    Ok(applied)
}
