use diesel::prelude::*;

use crate::{
    models::registry::{Distribution, NewDistribution},
    schema::registry::{distributions, releases},
};

/// Repository for uploaded distribution files.
pub struct DistributionRepository;

impl DistributionRepository {
    pub fn insert(
        conn: &mut SqliteConnection,
        distribution: &NewDistribution,
    ) -> QueryResult<i32> {
        diesel::insert_into(distributions::table)
            .values(distribution)
            .returning(distributions::id)
            .get_result(conn)
    }

    /// Overwrites every column of an existing distribution row.
    pub fn replace(
        conn: &mut SqliteConnection,
        id: i32,
        distribution: &NewDistribution,
    ) -> QueryResult<usize> {
        diesel::update(distributions::table.filter(distributions::id.eq(id)))
            .set(distribution)
            .execute(conn)
    }

    /// Finds the distribution stored at `content`, the storage-relative path.
    pub fn find_by_content(
        conn: &mut SqliteConnection,
        content: &str,
    ) -> QueryResult<Option<Distribution>> {
        distributions::table
            .filter(distributions::content.eq(content))
            .select(Distribution::as_select())
            .first(conn)
            .optional()
    }

    pub fn list_for_release(
        conn: &mut SqliteConnection,
        release_id: i32,
    ) -> QueryResult<Vec<Distribution>> {
        distributions::table
            .filter(distributions::release_id.eq(release_id))
            .order(distributions::id.asc())
            .select(Distribution::as_select())
            .load(conn)
    }

    /// Lists every distribution of a package together with its release version.
    pub fn list_for_package(
        conn: &mut SqliteConnection,
        package_id: i32,
    ) -> QueryResult<Vec<(String, Distribution)>> {
        distributions::table
            .inner_join(releases::table)
            .filter(releases::package_id.eq(package_id))
            .order((releases::id.asc(), distributions::id.asc()))
            .select((releases::version, Distribution::as_select()))
            .load(conn)
    }

    pub fn count_for_release(conn: &mut SqliteConnection, release_id: i32) -> QueryResult<i64> {
        distributions::table
            .filter(distributions::release_id.eq(release_id))
            .count()
            .get_result(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{registry, seed_package, seed_release};

    fn new_distribution<'a>(release_id: i32, filename: &'a str, content: &'a str) -> NewDistribution<'a> {
        NewDistribution {
            release_id,
            content,
            filename,
            md5_digest: "6f5902ac237024bdd0c176cb93063dc4",
            size: 12,
            filetype: "sdist",
            pyversion: "any",
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_list() {
        let mut db = registry();
        let conn = db.conn();
        let package = seed_package(conn, "demo", None);
        let release = seed_release(conn, package, "1.0");

        DistributionRepository::insert(
            conn,
            &new_distribution(release, "demo-1.0.tar.gz", "dists/demo-1.0.tar.gz"),
        )
        .unwrap();
        DistributionRepository::insert(
            conn,
            &new_distribution(release, "demo-1.0.zip", "dists/demo-1.0.zip"),
        )
        .unwrap();

        let files = DistributionRepository::list_for_release(conn, release).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "demo-1.0.tar.gz");
        assert_eq!(DistributionRepository::count_for_release(conn, release).unwrap(), 2);

        let by_package = DistributionRepository::list_for_package(conn, package).unwrap();
        assert_eq!(by_package.len(), 2);
        assert!(by_package.iter().all(|(version, _)| version == "1.0"));
    }

    #[test]
    fn test_content_is_unique() {
        let mut db = registry();
        let conn = db.conn();
        let package = seed_package(conn, "demo", None);
        let first = seed_release(conn, package, "1.0");
        let second = seed_release(conn, package, "1.1");

        DistributionRepository::insert(
            conn,
            &new_distribution(first, "demo.tar.gz", "dists/demo.tar.gz"),
        )
        .unwrap();
        let clash = DistributionRepository::insert(
            conn,
            &new_distribution(second, "demo.tar.gz", "dists/demo.tar.gz"),
        );
        assert!(clash.is_err());
    }

    #[test]
    fn test_replace_overwrites_columns() {
        let mut db = registry();
        let conn = db.conn();
        let package = seed_package(conn, "demo", None);
        let release = seed_release(conn, package, "1.0");
        let id = DistributionRepository::insert(
            conn,
            &NewDistribution {
                comment: Some("first upload"),
                ..new_distribution(release, "demo-1.0.tar.gz", "dists/demo-1.0.tar.gz")
            },
        )
        .unwrap();

        DistributionRepository::replace(
            conn,
            id,
            &NewDistribution {
                md5_digest: "d41d8cd98f00b204e9800998ecf8427e",
                size: 0,
                ..new_distribution(release, "demo-1.0.tar.gz", "dists/demo-1.0.tar.gz")
            },
        )
        .unwrap();

        let stored = DistributionRepository::find_by_content(conn, "dists/demo-1.0.tar.gz")
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.md5_digest, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(stored.size, 0);
        assert_eq!(stored.comment, None);
    }
}
