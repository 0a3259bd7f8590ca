use std::path::{Path, PathBuf};

use crate::error::Result;

/// A distribution fetched into a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub filename: String,
    /// Digest published by the upstream index, if it advertised one.
    pub md5_digest: Option<String>,
}

/// Turns a package label into a local artifact.
pub trait Fetch {
    /// Fetches the artifact named by `label` into `dest_dir`.
    ///
    /// Returns `Ok(None)` when the label does not resolve to any artifact.
    fn fetch(&self, label: &str, dest_dir: &Path) -> Result<Option<FetchedArtifact>>;
}
