//! Registry accounts.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};
use wheelhouse_db::{
    models::registry::{NewUser, User},
    repository::user::UserRepository,
};

use crate::{
    context::RegistryContext,
    error::{OperationError, Result},
};

#[cfg(not(test))]
const PASSWORD_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const PASSWORD_COST: u32 = 4;

/// Creates an active user. Users without a password can own packages but cannot upload.
pub fn add_user(
    ctx: &RegistryContext,
    username: &str,
    email: &str,
    password: Option<&str>,
) -> Result<User> {
    let password_hash = password
        .map(|password| bcrypt::hash(password, PASSWORD_COST))
        .transpose()?;

    let user = ctx.db().with_conn(|conn| {
        if UserRepository::find_by_username(conn, username)?.is_some() {
            return Ok(None);
        }
        let id = UserRepository::insert(
            conn,
            &NewUser {
                username,
                email,
                password_hash: password_hash.as_deref(),
                is_active: true,
            },
        )?;
        UserRepository::find_by_id(conn, id)
    })?;

    let user = user.ok_or_else(|| OperationError::UserExists(username.to_string()))?;
    info!(username, "user created");
    Ok(user)
}

pub fn list_users(ctx: &RegistryContext) -> Result<Vec<User>> {
    Ok(ctx.db().with_conn(UserRepository::list_all)?)
}

/// Replaces the password of `username`.
pub fn set_password(ctx: &RegistryContext, username: &str, password: &str) -> Result<()> {
    let hash = bcrypt::hash(password, PASSWORD_COST)?;
    let updated = ctx.db().with_conn(|conn| {
        match UserRepository::find_by_username(conn, username)? {
            Some(user) => UserRepository::set_password_hash(conn, user.id, &hash),
            None => Ok(0),
        }
    })?;

    if updated == 0 {
        return Err(OperationError::UserNotFound(username.to_string()));
    }
    Ok(())
}

/// Checks a username and password against the registry.
///
/// Returns the user when the credentials match an active account.
pub fn authenticate(ctx: &RegistryContext, username: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = ctx
        .db()
        .with_conn(|conn| UserRepository::find_by_username(conn, username))?
    else {
        debug!(username, "unknown user");
        return Ok(None);
    };

    let Some(hash) = user.password_hash.as_deref().filter(|_| user.is_active) else {
        debug!(username, "user is inactive or has no password");
        return Ok(None);
    };

    Ok(bcrypt::verify(password, hash)?.then_some(user))
}

/// Decodes an HTTP `Authorization: Basic` header value into username and password.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestRegistry;

    #[test]
    fn test_add_and_authenticate() {
        let registry = TestRegistry::new();
        let ctx = registry.context();

        let user = add_user(ctx, "alice", "alice@example.com", Some("s3cret")).unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.is_active);

        let authenticated = authenticate(ctx, "alice", "s3cret").unwrap().unwrap();
        assert_eq!(authenticated.id, user.id);
        assert!(authenticate(ctx, "alice", "wrong").unwrap().is_none());
        assert!(authenticate(ctx, "nobody", "s3cret").unwrap().is_none());

        assert!(matches!(
            add_user(ctx, "alice", "other@example.com", None),
            Err(OperationError::UserExists(_))
        ));
        assert_eq!(list_users(ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_user_without_password_cannot_log_in() {
        let registry = TestRegistry::new();
        let ctx = registry.context();
        add_user(ctx, "bob", "bob@example.com", None).unwrap();

        assert!(authenticate(ctx, "bob", "").unwrap().is_none());

        set_password(ctx, "bob", "hunter2").unwrap();
        assert!(authenticate(ctx, "bob", "hunter2").unwrap().is_some());
        assert!(matches!(
            set_password(ctx, "carol", "x"),
            Err(OperationError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_parse_basic_auth() {
        let header = format!("Basic {}", STANDARD.encode("alice:pa:ss"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("alice".to_string(), "pa:ss".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
    }
}
