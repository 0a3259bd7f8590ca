//! Ownership resolution.
//!
//! Decides which user owns a package. An explicit owner given by the operator always wins and
//! must exist. Without one the author email of the distribution is matched against known
//! users, then an existing owner is kept, and finally the authenticated uploader is accepted
//! when global ownership is enabled.

use diesel::SqliteConnection;
use tracing::debug;
use wheelhouse_db::{models::registry::User, repository::user::UserRepository};

use crate::error::{RegistryError, Result};

/// An operator supplied owner identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerHint<'a> {
    Email(&'a str),
    Username(&'a str),
}

impl<'a> OwnerHint<'a> {
    /// Interprets identifiers containing `@` as emails and everything else as usernames.
    pub fn parse(identifier: &'a str) -> Self {
        let identifier = identifier.trim();
        if identifier.contains('@') {
            OwnerHint::Email(identifier)
        } else {
            OwnerHint::Username(identifier)
        }
    }

    pub fn as_str(&self) -> &'a str {
        match self {
            OwnerHint::Email(value) | OwnerHint::Username(value) => value,
        }
    }

    fn lookup(&self, conn: &mut SqliteConnection) -> Result<Option<User>> {
        let user = match self {
            OwnerHint::Email(email) => UserRepository::find_by_email(conn, email)?,
            OwnerHint::Username(username) => UserRepository::find_by_username(conn, username)?,
        };
        Ok(user)
    }
}

/// How an owner was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSource {
    Explicit,
    AuthorEmail,
    Existing,
    Uploader,
}

/// The outcome of ownership resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOwner {
    pub user_id: i32,
    pub source: OwnerSource,
}

/// Inputs to ownership resolution for a single publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipRequest<'a> {
    /// Package being published.
    pub package: &'a str,
    /// Owner forced by the operator.
    pub explicit: Option<&'a str>,
    /// Author email declared by the distribution.
    pub author_email: Option<&'a str>,
    /// Current owner of the package, if it exists and has one.
    pub existing_owner: Option<i32>,
    /// Authenticated user performing the upload.
    pub uploader: Option<i32>,
}

/// Resolves package owners according to the configured ownership policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipResolver {
    global_ownership: bool,
}

impl OwnershipResolver {
    pub fn new(global_ownership: bool) -> Self {
        Self { global_ownership }
    }

    pub fn global_ownership(&self) -> bool {
        self.global_ownership
    }

    /// Resolves the owner for `request`.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::OwnerNotFound`] if an explicit owner was given but does not exist.
    ///   Resolution does not fall back to the author email in that case.
    /// * [`RegistryError::NoOwnerResolved`] if no owner could be placed.
    pub fn resolve(
        &self,
        conn: &mut SqliteConnection,
        request: &OwnershipRequest,
    ) -> Result<ResolvedOwner> {
        if let Some(explicit) = request.explicit.filter(|value| !value.trim().is_empty()) {
            let hint = OwnerHint::parse(explicit);
            let user = hint
                .lookup(conn)?
                .ok_or_else(|| RegistryError::OwnerNotFound(hint.as_str().to_string()))?;
            debug!(package = request.package, owner = %user.username, "owner given explicitly");
            return Ok(ResolvedOwner {
                user_id: user.id,
                source: OwnerSource::Explicit,
            });
        }

        if let Some(email) = request.author_email.filter(|value| !value.trim().is_empty()) {
            if let Some(user) = UserRepository::find_by_email(conn, email.trim())? {
                debug!(
                    package = request.package,
                    owner = %user.username,
                    "owner matched by author email"
                );
                return Ok(ResolvedOwner {
                    user_id: user.id,
                    source: OwnerSource::AuthorEmail,
                });
            }
        }

        if let Some(owner) = request.existing_owner {
            return Ok(ResolvedOwner {
                user_id: owner,
                source: OwnerSource::Existing,
            });
        }

        match request.uploader {
            Some(uploader) if self.global_ownership => {
                Ok(ResolvedOwner {
                    user_id: uploader,
                    source: OwnerSource::Uploader,
                })
            }
            _ => Err(RegistryError::NoOwnerResolved(request.package.to_string())),
        }
    }
}
