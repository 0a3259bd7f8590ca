use diesel::prelude::*;

use crate::{
    models::registry::Classifier,
    schema::registry::{classifiers, package_classifiers},
};

/// Repository for classifier tags and their package links.
pub struct ClassifierRepository;

impl ClassifierRepository {
    /// Returns the id of the classifier named `name`, creating it on first use.
    pub fn get_or_create(conn: &mut SqliteConnection, name: &str) -> QueryResult<i32> {
        diesel::insert_or_ignore_into(classifiers::table)
            .values(classifiers::name.eq(name))
            .execute(conn)?;

        classifiers::table
            .filter(classifiers::name.eq(name))
            .select(classifiers::id)
            .first(conn)
    }

    /// Links a classifier to a package; linking twice is a no-op.
    pub fn attach(
        conn: &mut SqliteConnection,
        package_id: i32,
        classifier_id: i32,
    ) -> QueryResult<usize> {
        diesel::insert_or_ignore_into(package_classifiers::table)
            .values((
                package_classifiers::package_id.eq(package_id),
                package_classifiers::classifier_id.eq(classifier_id),
            ))
            .execute(conn)
    }

    pub fn list_all(conn: &mut SqliteConnection) -> QueryResult<Vec<Classifier>> {
        classifiers::table
            .order(classifiers::name.asc())
            .select(Classifier::as_select())
            .load(conn)
    }

    pub fn list_names(conn: &mut SqliteConnection) -> QueryResult<Vec<String>> {
        classifiers::table
            .order(classifiers::name.asc())
            .select(classifiers::name)
            .load(conn)
    }

    pub fn list_for_package(
        conn: &mut SqliteConnection,
        package_id: i32,
    ) -> QueryResult<Vec<String>> {
        package_classifiers::table
            .inner_join(classifiers::table)
            .filter(package_classifiers::package_id.eq(package_id))
            .order(classifiers::name.asc())
            .select(classifiers::name)
            .load(conn)
    }
}
