use diesel::prelude::*;

use crate::{
    models::registry::{NewUser, User},
    schema::registry::users,
};

/// Repository for registry accounts.
pub struct UserRepository;

impl UserRepository {
    pub fn insert(conn: &mut SqliteConnection, user: &NewUser) -> QueryResult<i32> {
        diesel::insert_into(users::table)
            .values(user)
            .returning(users::id)
            .get_result(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<User>> {
        users::table
            .filter(users::id.eq(id))
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_by_username(
        conn: &mut SqliteConnection,
        username: &str,
    ) -> QueryResult<Option<User>> {
        users::table
            .filter(users::username.eq(username))
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    /// Finds the oldest account registered with `email`.
    ///
    /// Emails are not unique, so the earliest account wins when several share one.
    pub fn find_by_email(conn: &mut SqliteConnection, email: &str) -> QueryResult<Option<User>> {
        users::table
            .filter(users::email.eq(email))
            .order(users::id.asc())
            .select(User::as_select())
            .first(conn)
            .optional()
    }

    pub fn list_all(conn: &mut SqliteConnection) -> QueryResult<Vec<User>> {
        users::table
            .order(users::username.asc())
            .select(User::as_select())
            .load(conn)
    }

    pub fn set_password_hash(
        conn: &mut SqliteConnection,
        id: i32,
        password_hash: &str,
    ) -> QueryResult<usize> {
        diesel::update(users::table.filter(users::id.eq(id)))
            .set(users::password_hash.eq(password_hash))
            .execute(conn)
    }

    pub fn set_active(conn: &mut SqliteConnection, id: i32, active: bool) -> QueryResult<usize> {
        diesel::update(users::table.filter(users::id.eq(id)))
            .set(users::is_active.eq(active))
            .execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{registry, seed_user};

    #[test]
    fn test_find_by_username_and_email() {
        let mut db = registry();
        let conn = db.conn();
        let alice = seed_user(conn, "alice", "alice@example.com");

        let by_name = UserRepository::find_by_username(conn, "alice").unwrap().unwrap();
        assert_eq!(by_name.id, alice);
        assert!(by_name.is_active);

        let by_email = UserRepository::find_by_email(conn, "alice@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(by_email.username, "alice");

        assert!(UserRepository::find_by_username(conn, "nobody").unwrap().is_none());
        assert!(UserRepository::find_by_email(conn, "nobody@example.com")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_by_email_prefers_oldest() {
        let mut db = registry();
        let conn = db.conn();
        let first = seed_user(conn, "first", "shared@example.com");
        seed_user(conn, "second", "shared@example.com");

        let user = UserRepository::find_by_email(conn, "shared@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(user.id, first);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let mut db = registry();
        let conn = db.conn();
        seed_user(conn, "alice", "alice@example.com");

        let result = UserRepository::insert(
            conn,
            &NewUser {
                username: "alice",
                email: "other@example.com",
                password_hash: None,
                is_active: true,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_update_password_and_active() {
        let mut db = registry();
        let conn = db.conn();
        let id = seed_user(conn, "alice", "alice@example.com");

        UserRepository::set_password_hash(conn, id, "$2b$04$hash").unwrap();
        UserRepository::set_active(conn, id, false).unwrap();

        let user = UserRepository::find_by_id(conn, id).unwrap().unwrap();
        assert_eq!(user.password_hash.as_deref(), Some("$2b$04$hash"));
        assert!(!user.is_active);
    }
}
