//! Error types for wheelhouse-operations.

use miette::Diagnostic;
use thiserror::Error;
use wheelhouse_config::error::ConfigError;
use wheelhouse_core::error::RegistryError;
use wheelhouse_dl::error::DownloadError;
use wheelhouse_package::PackageError;

#[derive(Error, Diagnostic, Debug)]
pub enum OperationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error("Unknown {kind} handler `{handler}` configured for `{name}`")]
    #[diagnostic(
        code(wheelhouse::unknown_handler),
        help("Valid handlers: {available}")
    )]
    UnknownHandler {
        kind: &'static str,
        name: String,
        handler: String,
        available: String,
    },

    #[error("User `{0}` already exists")]
    #[diagnostic(code(wheelhouse::user_exists))]
    UserExists(String),

    #[error("User `{0}` not found")]
    #[diagnostic(code(wheelhouse::user_not_found))]
    UserNotFound(String),

    #[error("Package `{0}` not found")]
    #[diagnostic(code(wheelhouse::package_not_found))]
    PackageNotFound(String),

    #[error("Release `{name}` `{version}` not found")]
    #[diagnostic(code(wheelhouse::release_not_found))]
    ReleaseNotFound { name: String, version: String },

    #[error("Password hashing failed: {0}")]
    #[diagnostic(code(wheelhouse::password))]
    Password(#[from] bcrypt::BcryptError),
}

impl From<PackageError> for OperationError {
    fn from(err: PackageError) -> Self {
        Self::Registry(RegistryError::Package(err))
    }
}

pub type Result<T> = std::result::Result<T, OperationError>;
