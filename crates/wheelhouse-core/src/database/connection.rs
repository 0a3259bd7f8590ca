//! Database connection management.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use diesel::SqliteConnection;
use wheelhouse_db::{connection::DbConnection, error::DbError};

use crate::error::RegistryError;

type Result<T> = std::result::Result<T, RegistryError>;

/// Thread-safe handle to the registry database.
///
/// Cloning is cheap and every clone shares the same connection.
#[derive(Clone)]
pub struct RegistryDatabase {
    conn: Arc<Mutex<DbConnection>>,
}

impl RegistryDatabase {
    /// Opens the registry database at `path`, running pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = DbConnection::open(path).map_err(DbError::from)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a private in-memory registry.
    pub fn open_in_memory() -> Result<Self> {
        let conn = DbConnection::open_in_memory().map_err(DbError::from)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Locks the connection and returns a guard.
    pub fn conn(&self) -> Result<MutexGuard<'_, DbConnection>> {
        self.conn.lock().map_err(|_| RegistryError::PoisonError)
    }

    /// Executes a read with the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> diesel::QueryResult<T>,
    {
        let mut conn = self.conn()?;
        Ok(f(conn.conn())?)
    }

    /// Executes `f` inside an immediate transaction.
    ///
    /// The write lock is taken when the transaction begins, so concurrent writers queue behind
    /// each other instead of racing between a read and the following write. Any error rolls
    /// the transaction back.
    pub fn immediate_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T>,
    {
        let mut conn = self.conn()?;
        conn.conn().immediate_transaction(f)
    }
}

#[cfg(test)]
mod tests {
    use wheelhouse_db::repository::package::PackageRepository;
    use wheelhouse_db::models::registry::NewPackage;

    use super::*;

    fn new_package(name: &str) -> NewPackage<'_> {
        NewPackage {
            name,
            owner_id: None,
            license: "MIT",
            metadata_version: "1.0",
        }
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = RegistryDatabase::open_in_memory().unwrap();

        let result: Result<()> = db.immediate_transaction(|conn| {
            PackageRepository::insert(conn, &new_package("demo"))?;
            Err(RegistryError::NoOwnerResolved("demo".into()))
        });
        assert!(result.is_err());

        let count = db.with_conn(PackageRepository::count).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_clones_share_connection() {
        let db = RegistryDatabase::open_in_memory().unwrap();
        let other = db.clone();

        db.immediate_transaction(|conn| Ok(PackageRepository::insert(conn, &new_package("demo"))?))
            .unwrap();

        let found = other
            .with_conn(|conn| PackageRepository::find_by_name(conn, "demo"))
            .unwrap();
        assert!(found.is_some());
    }
}
