//! Error types for the package crate.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while reading and resolving distribution metadata.
#[derive(Error, Diagnostic, Debug)]
pub enum PackageError {
    #[error("Could not read package metadata from {source_name}: {reason}")]
    #[diagnostic(
        code(wheelhouse_package::metadata_unreadable),
        help("Upload an sdist, egg or wheel that carries a PKG-INFO or METADATA file")
    )]
    MetadataUnreadable { source_name: String, reason: String },

    #[error("Unsupported metadata version: {0}")]
    #[diagnostic(
        code(wheelhouse_package::unsupported_metadata_version),
        help("Supported metadata versions are 1.0, 1.1 and 1.2")
    )]
    UnsupportedMetadataVersion(String),

    #[error("Invalid metadata field `{field}`: {reason}")]
    #[diagnostic(code(wheelhouse_package::invalid_metadata))]
    InvalidMetadata { field: String, reason: String },

    #[error("Field `{field}` is not defined by metadata version {version}")]
    #[diagnostic(
        code(wheelhouse_package::unknown_field),
        help("Remove the field from `metadata_fields` in your configuration")
    )]
    UnknownField { version: String, field: String },

    #[error("Unknown distribution file type: {0}")]
    #[diagnostic(
        code(wheelhouse_package::filetype),
        help("Use one of sdist, bdist_dumb, bdist_rpm, bdist_wininst, bdist_egg, bdist_dmg")
    )]
    UnknownFileType(String),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(wheelhouse_package::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },
}

impl PackageError {
    pub(crate) fn unreadable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        PackageError::MetadataUnreadable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        PackageError::InvalidMetadata {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for package operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            PackageError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
