use rusqlite::{OptionalExtension, Result as SqlResult, params};
use std::path::Path;

use super::database::Database;
use super::models::SessionRecord;

/// Device-local storage for the single active session.
pub struct SessionDatabase {
    db: Database,
}

impl SessionDatabase {
    /// Open (or create) the session database at `path`
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        Self::from_database(Database::open(path)?)
    }

    pub fn in_memory() -> SqlResult<Self> {
        Self::from_database(Database::in_memory()?)
    }

    fn from_database(db: Database) -> SqlResult<Self> {
        let session_db = Self { db };
        session_db.init_schema()?;
        Ok(session_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        // Session table (single row)
        self.db.with_connection(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS session (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    record TEXT NOT NULL,
                    saved_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
                )",
                [],
            )?;
            Ok(())
        })
    }

    /// Save the session record (replace if exists)
    pub fn save(&self, record: &str) -> SqlResult<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO session (id, record, saved_at)
                 VALUES (1, ?1, strftime('%s', 'now'))",
                params![record],
            )?;
            Ok(())
        })
    }

    /// Get the stored session record, if any
    pub fn load(&self) -> SqlResult<Option<SessionRecord>> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT record, saved_at FROM session WHERE id = 1",
                [],
                |row| {
                    Ok(SessionRecord {
                        record: row.get(0)?,
                        saved_at: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Remove the stored session
    pub fn clear(&self) -> SqlResult<()> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM session WHERE id = 1", [])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_replaces_single_row() {
        let db = SessionDatabase::in_memory().unwrap();
        assert!(db.load().unwrap().is_none());

        db.save(r#"{"_id":"a"}"#).unwrap();
        db.save(r#"{"_id":"b"}"#).unwrap();
        let row = db.load().unwrap().unwrap();
        assert_eq!(row.record, r#"{"_id":"b"}"#);
        assert!(row.saved_at > 0);

        db.clear().unwrap();
        assert!(db.load().unwrap().is_none());
    }
}
