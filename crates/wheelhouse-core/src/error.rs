//! Error types for wheelhouse-core.

use miette::Diagnostic;
use thiserror::Error;
use wheelhouse_db::error::DbError;
use wheelhouse_package::PackageError;
use wheelhouse_utils::error::{FileSystemError, HashError, PathError};

/// Errors raised while resolving owners, storing artifacts or publishing releases.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Package(#[from] PackageError),

    #[error("Owner `{0}` does not exist")]
    #[diagnostic(
        code(wheelhouse::owner_not_found),
        help("Create the user first with `wheelhouse user add`, or pass an existing username or email")
    )]
    OwnerNotFound(String),

    #[error("No owner defined for new package `{0}`. Use --owner to force one")]
    #[diagnostic(
        code(wheelhouse::no_owner),
        help("Pass --owner, register a user whose email matches the author email, or enable `global_ownership`")
    )]
    NoOwnerResolved(String),

    #[error("User `{user}` is not the owner of package `{package}`")]
    #[diagnostic(code(wheelhouse::not_owner))]
    NotOwner { user: String, package: String },

    #[error("Checksum mismatch for `{filename}`: declared {expected}, computed {actual}")]
    #[diagnostic(
        code(wheelhouse::checksum),
        help("The upload may be corrupted. Try uploading again.")
    )]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("File `{filename}` already belongs to {owner}")]
    #[diagnostic(
        code(wheelhouse::filename_conflict),
        help("Distribution filenames must be unique across the registry")
    )]
    FilenameConflict { filename: String, owner: String },

    #[error(transparent)]
    #[diagnostic(code(wheelhouse::invalid_filename))]
    InvalidFilename(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),

    #[error("Error while {action}")]
    #[diagnostic(code(wheelhouse::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(wheelhouse::filesystem))]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(wheelhouse::hash))]
    Hash(#[from] HashError),

    #[error("Thread lock poison error")]
    #[diagnostic(
        code(wheelhouse::poison),
        help("This is an internal error, please report it")
    )]
    PoisonError,
}

impl RegistryError {
    /// Whether the error was caused by the request rather than by the registry.
    pub fn is_client_error(&self) -> bool {
        match self {
            RegistryError::Package(err) => !matches!(err, PackageError::IoError { .. }),
            RegistryError::ChecksumMismatch { .. }
            | RegistryError::FilenameConflict { .. }
            | RegistryError::InvalidFilename(_) => true,
            _ => false,
        }
    }

    /// Whether the error is an ownership or authorization failure.
    pub fn is_ownership_error(&self) -> bool {
        matches!(
            self,
            RegistryError::OwnerNotFound(_)
                | RegistryError::NoOwnerResolved(_)
                | RegistryError::NotOwner { .. }
        )
    }
}

impl From<diesel::result::Error> for RegistryError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database(DbError::from(err))
    }
}

impl<T> From<std::sync::PoisonError<T>> for RegistryError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::PoisonError
    }
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, RegistryError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, RegistryError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            RegistryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = RegistryError::Package(PackageError::UnsupportedMetadataVersion("9.9".into()));
        assert!(err.is_client_error());
        assert!(!err.is_ownership_error());

        let err = RegistryError::NoOwnerResolved("demo".into());
        assert!(err.is_ownership_error());
        assert!(!err.is_client_error());

        let err: RegistryError = diesel::result::Error::NotFound.into();
        assert!(matches!(err, RegistryError::Database(DbError::NotFound(_))));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_no_owner_message() {
        let err = RegistryError::NoOwnerResolved("demo".into());
        assert_eq!(
            err.to_string(),
            "No owner defined for new package `demo`. Use --owner to force one"
        );
    }
}
