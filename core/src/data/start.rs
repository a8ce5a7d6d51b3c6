//! Database initialization and startup
//!
//! Opens the SQLite database, ensures the schema exists and upgrades tables
//! written by older releases.

use rusqlite::Connection;
use tracing::info;

use super::schema::{create_all_tables, run_migrations};

/// Error type for database startup
#[derive(Debug)]
pub enum StartError {
    /// SQLite error
    Database(rusqlite::Error),
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StartError {}

impl From<rusqlite::Error> for StartError {
    fn from(e: rusqlite::Error) -> Self {
        StartError::Database(e)
    }
}

/// Opens the database and ensures all required tables exist
///
/// Schema creation is idempotent (`CREATE TABLE IF NOT EXISTS`) and is
/// followed by migrations, so a database written by an older release is
/// upgraded in place.
pub fn start_db(db_path: &str) -> Result<Connection, StartError> {
    let conn = Connection::open(db_path)?;

    // PRAGMA returns the new mode, so query_row instead of execute
    let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

    create_all_tables(&conn)?;
    let applied = run_migrations(&conn)?;
    if applied > 0 {
        info!(db_path, applied, "migrated processed_messages schema");
    }

    Ok(conn)
}

/// Create an in-memory database for testing
pub fn start_memory_db() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    // WAL mode doesn't work with in-memory databases, skip it
    create_all_tables(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_db_path(name: &str) -> String {
        let temp_dir = std::env::temp_dir();
        format!("{}/courier_test_{}.db", temp_dir.display(), name)
    }

    fn cleanup(path: &str) {
        let _ = fs::remove_file(path);
        let _ = fs::remove_file(format!("{}-wal", path));
        let _ = fs::remove_file(format!("{}-shm", path));
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_creates_tables_on_new_db() {
        let db_path = temp_db_path("start_new_db");
        cleanup(&db_path);

        let conn = start_db(&db_path).unwrap();
        assert!(table_names(&conn).contains(&"processed_messages".to_string()));

        drop(conn);
        cleanup(&db_path);
    }

    #[test]
    fn test_reopening_db_preserves_data() {
        let db_path = temp_db_path("start_reopen");
        cleanup(&db_path);

        {
            let conn = start_db(&db_path).unwrap();
            conn.execute(
                "INSERT INTO processed_messages (message_id, insertion_time) VALUES ('K1', 1)",
                [],
            )
            .unwrap();
        }

        {
            let conn = start_db(&db_path).unwrap();
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM processed_messages", [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 1);
        }

        cleanup(&db_path);
    }

    #[test]
    fn test_upgrades_legacy_db() {
        let db_path = temp_db_path("start_legacy");
        cleanup(&db_path);

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute(
                "CREATE TABLE processed_messages (
                    message_id TEXT PRIMARY KEY NOT NULL,
                    insertion_time INTEGER NOT NULL
                )",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO processed_messages VALUES ('legacy', 1)",
                [],
            )
            .unwrap();
        }

        let conn = start_db(&db_path).unwrap();
        let sender: Option<String> = conn
            .query_row(
                "SELECT sender FROM processed_messages WHERE message_id = 'legacy'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(sender.is_none());

        drop(conn);
        cleanup(&db_path);
    }

    #[test]
    fn test_memory_db() {
        let conn = start_memory_db().unwrap();
        assert!(table_names(&conn).contains(&"processed_messages".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = StartError::from(rusqlite::Error::InvalidQuery);
        assert!(err.to_string().starts_with("database error"));
    }
}
