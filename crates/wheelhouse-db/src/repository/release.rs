use diesel::prelude::*;
use serde_json::Value;

use crate::{
    models::registry::{NewRelease, Release},
    schema::registry::{packages, releases},
};

/// Repository for package releases.
pub struct ReleaseRepository;

impl ReleaseRepository {
    pub fn find(
        conn: &mut SqliteConnection,
        package_id: i32,
        version: &str,
    ) -> QueryResult<Option<Release>> {
        releases::table
            .filter(releases::package_id.eq(package_id))
            .filter(releases::version.eq(version))
            .select(Release::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Release>> {
        releases::table
            .filter(releases::id.eq(id))
            .select(Release::as_select())
            .first(conn)
            .optional()
    }

    /// Finds a release by package name and version in one query.
    pub fn find_by_name(
        conn: &mut SqliteConnection,
        name: &str,
        version: &str,
    ) -> QueryResult<Option<Release>> {
        releases::table
            .inner_join(packages::table)
            .filter(packages::name.eq(name))
            .filter(releases::version.eq(version))
            .select(Release::as_select())
            .first(conn)
            .optional()
    }

    pub fn insert(conn: &mut SqliteConnection, release: &NewRelease) -> QueryResult<i32> {
        diesel::insert_into(releases::table)
            .values(release)
            .returning(releases::id)
            .get_result(conn)
    }

    /// Replaces the metadata blob of an existing release.
    pub fn replace_info(
        conn: &mut SqliteConnection,
        id: i32,
        metadata_version: &str,
        package_info: &Value,
    ) -> QueryResult<usize> {
        diesel::update(releases::table.filter(releases::id.eq(id)))
            .set((
                releases::metadata_version.eq(metadata_version),
                releases::package_info.eq(package_info.clone()),
            ))
            .execute(conn)
    }

    /// Lists the releases of a package in publication order.
    pub fn list_for_package(
        conn: &mut SqliteConnection,
        package_id: i32,
        include_hidden: bool,
    ) -> QueryResult<Vec<Release>> {
        let mut query = releases::table
            .filter(releases::package_id.eq(package_id))
            .into_boxed();

        if !include_hidden {
            query = query.filter(releases::hidden.eq(false));
        }

        query
            .order(releases::id.asc())
            .select(Release::as_select())
            .load(conn)
    }

    pub fn set_hidden(conn: &mut SqliteConnection, id: i32, hidden: bool) -> QueryResult<usize> {
        diesel::update(releases::table.filter(releases::id.eq(id)))
            .set(releases::hidden.eq(hidden))
            .execute(conn)
    }

    pub fn count_for_package(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<i64> {
        releases::table
            .filter(releases::package_id.eq(package_id))
            .count()
            .get_result(conn)
    }
}
