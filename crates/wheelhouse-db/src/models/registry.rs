use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::schema::registry::*;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Default, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = packages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Package {
    pub id: i32,
    pub name: String,
    pub owner_id: Option<i32>,
    pub license: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub home_page: Option<String>,
    pub download_url: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub metadata_version: String,
    pub created_at: String,
}

#[derive(Default, Insertable)]
#[diesel(table_name = packages)]
pub struct NewPackage<'a> {
    pub name: &'a str,
    pub owner_id: Option<i32>,
    pub license: &'a str,
    pub metadata_version: &'a str,
}

/// Descriptive package attributes refreshed on every accepted publish.
///
/// Absent values clear the stored column so the package mirrors its latest release.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = packages)]
#[diesel(treat_none_as_null = true)]
pub struct PackageAttributes<'a> {
    pub license: &'a str,
    pub summary: Option<&'a str>,
    pub description: Option<&'a str>,
    pub home_page: Option<&'a str>,
    pub download_url: Option<&'a str>,
    pub author: Option<&'a str>,
    pub author_email: Option<&'a str>,
    pub metadata_version: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = releases)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Release {
    pub id: i32,
    pub package_id: i32,
    pub version: String,
    pub metadata_version: String,
    pub package_info: Value,
    pub hidden: bool,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = releases)]
pub struct NewRelease<'a> {
    pub package_id: i32,
    pub version: &'a str,
    pub metadata_version: &'a str,
    pub package_info: Value,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = distributions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Distribution {
    pub id: i32,
    pub release_id: i32,
    pub content: String,
    pub filename: String,
    pub md5_digest: String,
    pub size: i64,
    pub filetype: String,
    pub pyversion: String,
    pub uploader_id: Option<i32>,
    pub comment: Option<String>,
    pub signature: Option<String>,
    pub created_at: String,
}

#[derive(Default, Insertable, AsChangeset)]
#[diesel(table_name = distributions)]
#[diesel(treat_none_as_null = true)]
pub struct NewDistribution<'a> {
    pub release_id: i32,
    pub content: &'a str,
    pub filename: &'a str,
    pub md5_digest: &'a str,
    pub size: i64,
    pub filetype: &'a str,
    pub pyversion: &'a str,
    pub uploader_id: Option<i32>,
    pub comment: Option<&'a str>,
    pub signature: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = classifiers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Classifier {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = reviews)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Review {
    pub id: i32,
    pub package_id: i32,
    pub author_id: Option<i32>,
    pub rating: Option<i32>,
    pub comment: String,
    pub created_at: String,
}

#[derive(Default, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview<'a> {
    pub package_id: i32,
    pub author_id: Option<i32>,
    pub rating: Option<i32>,
    pub comment: &'a str,
}
