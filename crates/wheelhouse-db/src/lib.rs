//! Registry store for wheelhouse.
//!
//! Packages, releases, distributions, classifiers, reviews and users live in a single SQLite
//! database managed through diesel. Repositories are stateless unit structs operating on a
//! borrowed [`diesel::SqliteConnection`], so callers decide the transaction boundaries.

pub mod connection;
pub mod error;
pub mod migration;
pub mod models;
pub mod repository;
pub mod schema;
