use diesel::prelude::*;

use crate::{
    models::registry::{NewReview, Review},
    schema::registry::reviews,
};

/// Repository for package reviews.
pub struct ReviewRepository;

impl ReviewRepository {
    pub fn insert(conn: &mut SqliteConnection, review: &NewReview) -> QueryResult<i32> {
        diesel::insert_into(reviews::table)
            .values(review)
            .returning(reviews::id)
            .get_result(conn)
    }

    pub fn list_for_package(
        conn: &mut SqliteConnection,
        package_id: i32,
    ) -> QueryResult<Vec<Review>> {
        reviews::table
            .filter(reviews::package_id.eq(package_id))
            .order(reviews::id.asc())
            .select(Review::as_select())
            .load(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{registry, seed_package};

    #[test]
    fn test_reviews_follow_package() {
        let mut db = registry();
        let conn = db.conn();
        let package = seed_package(conn, "demo", None);

        ReviewRepository::insert(
            conn,
            &NewReview {
                package_id: package,
                rating: Some(5),
                comment: "works well",
                ..Default::default()
            },
        )
        .unwrap();

        let reviews = ReviewRepository::list_for_package(conn, package).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].comment, "works well");
        assert_eq!(reviews[0].rating, Some(5));
    }
}
