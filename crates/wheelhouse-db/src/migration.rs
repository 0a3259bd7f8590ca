use std::error::Error;

use diesel::{sql_query, RunQueryDsl, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const REGISTRY_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/registry");

pub fn apply_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    loop {
        match conn.run_pending_migrations(REGISTRY_MIGRATIONS) {
            Ok(_) => break,
            Err(e) if e.to_string().contains("already exists") => {
                mark_first_pending(conn)?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Records the first pending migration as applied.
///
/// Used when a table created by that migration already exists, e.g. a database that was
/// initialised by hand before migrations were tracked.
fn mark_first_pending(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let pending = conn.pending_migrations(REGISTRY_MIGRATIONS)?;
    match pending.first() {
        Some(first) => {
            sql_query("INSERT INTO __diesel_schema_migrations (version) VALUES (?1)")
                .bind::<diesel::sql_types::Text, _>(first.name().version().to_string())
                .execute(conn)?;
            Ok(())
        }
        None => Err("migration reported an existing table but none are pending".into()),
    }
}
