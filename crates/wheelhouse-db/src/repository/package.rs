use diesel::prelude::*;

use crate::{
    models::registry::{NewPackage, Package, PackageAttributes},
    schema::registry::packages,
};

/// Repository for package records.
pub struct PackageRepository;

impl PackageRepository {
    pub fn find_by_name(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Package>> {
        packages::table
            .filter(packages::name.eq(name))
            .select(Package::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Package>> {
        packages::table
            .filter(packages::id.eq(id))
            .select(Package::as_select())
            .first(conn)
            .optional()
    }

    pub fn insert(conn: &mut SqliteConnection, package: &NewPackage) -> QueryResult<i32> {
        diesel::insert_into(packages::table)
            .values(package)
            .returning(packages::id)
            .get_result(conn)
    }

    /// Refreshes the descriptive attributes of a package from its latest release.
    pub fn update_attributes(
        conn: &mut SqliteConnection,
        id: i32,
        attributes: &PackageAttributes,
    ) -> QueryResult<usize> {
        diesel::update(packages::table.filter(packages::id.eq(id)))
            .set(attributes)
            .execute(conn)
    }

    /// Assigns an owner to a package that has none.
    ///
    /// Existing owners are never replaced; the returned count is zero in that case.
    pub fn claim_owner(conn: &mut SqliteConnection, id: i32, owner_id: i32) -> QueryResult<usize> {
        diesel::update(
            packages::table
                .filter(packages::id.eq(id))
                .filter(packages::owner_id.is_null()),
        )
        .set(packages::owner_id.eq(owner_id))
        .execute(conn)
    }

    pub fn list_names(conn: &mut SqliteConnection) -> QueryResult<Vec<String>> {
        packages::table
            .order(packages::name.asc())
            .select(packages::name)
            .load(conn)
    }

    pub fn list_all(conn: &mut SqliteConnection) -> QueryResult<Vec<Package>> {
        packages::table
            .order(packages::name.asc())
            .select(Package::as_select())
            .load(conn)
    }

    pub fn count(conn: &mut SqliteConnection) -> QueryResult<i64> {
        packages::table.count().get_result(conn)
    }
}
