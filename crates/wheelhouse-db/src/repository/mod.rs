//! Repository pattern implementations for registry operations.
//!
//! - [`user::UserRepository`] - Accounts that own and upload packages
//! - [`package::PackageRepository`] - Package records and descriptive attributes
//! - [`release::ReleaseRepository`] - Versions and their metadata blobs
//! - [`distribution::DistributionRepository`] - Uploaded artifact records
//! - [`classifier::ClassifierRepository`] - Deduplicated taxonomy tags
//! - [`review::ReviewRepository`] - Free-form package feedback

pub mod classifier;
pub mod distribution;
pub mod package;
pub mod release;
pub mod review;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support {
    use diesel::SqliteConnection;

    use crate::{
        connection::DbConnection,
        models::registry::{NewPackage, NewRelease, NewUser},
        repository::{package::PackageRepository, release::ReleaseRepository, user::UserRepository},
    };

    pub fn registry() -> DbConnection {
        DbConnection::open_in_memory().unwrap()
    }

    pub fn seed_user(conn: &mut SqliteConnection, username: &str, email: &str) -> i32 {
        UserRepository::insert(
            conn,
            &NewUser {
                username,
                email,
                password_hash: None,
                is_active: true,
            },
        )
        .unwrap()
    }

    pub fn seed_package(conn: &mut SqliteConnection, name: &str, owner_id: Option<i32>) -> i32 {
        PackageRepository::insert(
            conn,
            &NewPackage {
                name,
                owner_id,
                license: "MIT",
                metadata_version: "1.0",
            },
        )
        .unwrap()
    }

    pub fn seed_release(conn: &mut SqliteConnection, package_id: i32, version: &str) -> i32 {
        ReleaseRepository::insert(
            conn,
            &NewRelease {
                package_id,
                version,
                metadata_version: "1.0",
                package_info: serde_json::json!({ "summary": ["demo"] }),
            },
        )
        .unwrap()
    }
}
