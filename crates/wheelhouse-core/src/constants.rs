//! Constants used throughout wheelhouse-core.

/// Python version recorded for distributions that declare no constraint.
pub const DEFAULT_PYVERSION: &str = "any";

/// Prefix of upload files staged inside the upload directory.
pub const STAGING_PREFIX: &str = ".upload-";

/// Suffix of the copy kept while an overwritten artifact is being replaced.
pub const BACKUP_SUFFIX: &str = ".previous";
