//! Database connection management.

use std::path::Path;

use diesel::{sql_query, Connection, ConnectionError, RunQueryDsl, SqliteConnection};

use crate::migration::apply_migrations;

/// Milliseconds a writer waits for a competing transaction before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Database connection wrapper with migration support.
pub struct DbConnection {
    conn: SqliteConnection,
}

impl DbConnection {
    /// Opens the registry database and runs pending migrations.
    ///
    /// The connection is switched to WAL mode, gets a busy timeout so concurrent writers queue
    /// instead of failing immediately, and enforces foreign keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or migrations fail.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConnectionError> {
        let path_str = path.as_ref().to_string_lossy();
        let mut conn = SqliteConnection::establish(&path_str)?;

        configure(&mut conn)?;

        apply_migrations(&mut conn).map_err(|e| ConnectionError::BadConnection(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Opens a private in-memory registry, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self, ConnectionError> {
        let mut conn = SqliteConnection::establish(":memory:")?;
        sql_query("PRAGMA foreign_keys = ON;")
            .execute(&mut conn)
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        apply_migrations(&mut conn).map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Gets a mutable reference to the underlying connection.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

fn configure(conn: &mut SqliteConnection) -> Result<(), ConnectionError> {
    let pragmas = [
        "PRAGMA journal_mode = WAL;".to_string(),
        format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"),
        "PRAGMA foreign_keys = ON;".to_string(),
    ];

    for pragma in pragmas {
        sql_query(pragma)
            .execute(conn)
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
    }

    Ok(())
}

impl std::ops::Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use diesel::prelude::*;

    use super::*;
    use crate::schema::registry::packages;

    #[test]
    fn test_open_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        let mut db = DbConnection::open(&path).unwrap();
        let count: i64 = packages::table.count().get_result(db.conn()).unwrap();
        assert_eq!(count, 0);
        drop(db);

        // Reopening an already migrated database is a no-op.
        let mut db = DbConnection::open(&path).unwrap();
        let count: i64 = packages::table.count().get_result(db.conn()).unwrap();
        assert_eq!(count, 0);
    }
}
