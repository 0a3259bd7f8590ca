//! Artifact storage.
//!
//! Artifacts live at `<storage root>/<upload_to>/<filename>` and the storage-relative path
//! `<upload_to>/<filename>` is what a distribution records. Uploads are first staged into a
//! temporary file inside the upload directory while their checksum is computed, then moved
//! into place with a rename once the registry is ready to commit.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use wheelhouse_utils::{
    fs::{ensure_dir_exists, replace_file, safe_remove},
    hash::copy_with_checksum,
    path::plain_filename,
};

use crate::{
    constants::{BACKUP_SUFFIX, STAGING_PREFIX},
    error::{ErrorContext, RegistryError, Result},
};

/// An upload written to a temporary file inside the upload directory.
///
/// Dropping a staged artifact removes the temporary file.
#[derive(Debug)]
pub struct StagedArtifact {
    file: NamedTempFile,
    size: u64,
    md5_digest: String,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn md5_digest(&self) -> &str {
        &self.md5_digest
    }
}

/// An artifact moved into its final location whose registry commit is still pending.
///
/// Unless [`Placement::commit`] is called, dropping the placement undoes the move: the
/// previous artifact is restored when one was replaced, otherwise the new file is removed.
#[derive(Debug)]
pub struct Placement {
    target: PathBuf,
    backup: Option<PathBuf>,
    committed: bool,
}

impl Placement {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Keeps the new artifact and discards the replaced one.
    pub fn commit(mut self) {
        self.committed = true;
        if let Some(backup) = self.backup.take() {
            if let Err(err) = safe_remove(&backup) {
                warn!("failed to remove replaced artifact {}: {err}", backup.display());
            }
        }
    }

    fn rollback(&mut self) {
        let result = match self.backup.take() {
            Some(backup) => replace_file(&backup, &self.target),
            None => safe_remove(&self.target),
        };
        if let Err(err) = result {
            warn!(
                "failed to roll back artifact {}: {err}",
                self.target.display()
            );
        } else {
            debug!("rolled back artifact {}", self.target.display());
        }
    }
}

impl Drop for Placement {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

/// Filesystem storage for distribution artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    upload_to: String,
}

impl ArtifactStore {
    /// Opens the store below `root`, creating the upload directory if needed.
    pub fn new<P: Into<PathBuf>>(root: P, upload_to: &str) -> Result<Self> {
        let store = Self {
            root: root.into(),
            upload_to: upload_to.trim_matches('/').to_string(),
        };
        ensure_dir_exists(store.upload_dir())?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn upload_to(&self) -> &str {
        &self.upload_to
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.root.join(&self.upload_to)
    }

    /// Returns the storage-relative path an artifact named `filename` is recorded under.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::InvalidFilename`] if `filename` is not a plain file name.
    pub fn content_path(&self, filename: &str) -> Result<String> {
        let filename = plain_filename(filename)?;
        if self.upload_to.is_empty() {
            Ok(filename.to_string())
        } else {
            Ok(format!("{}/{filename}", self.upload_to))
        }
    }

    /// Resolves a recorded storage-relative path to its location on disk.
    pub fn resolve(&self, content: &str) -> PathBuf {
        content
            .split('/')
            .fold(self.root.clone(), |path, component| path.join(component))
    }

    /// Streams `reader` into a staging file, computing its size and MD5 digest on the way.
    pub fn stage<R: Read>(&self, reader: R) -> Result<StagedArtifact> {
        let upload_dir = self.upload_dir();
        let mut file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&upload_dir)
            .with_context(|| format!("creating staging file in {}", upload_dir.display()))?;

        let (size, md5_digest) = copy_with_checksum(reader, file.as_file_mut())?;
        debug!(size, md5 = md5_digest.as_str(), "staged upload");

        Ok(StagedArtifact {
            file,
            size,
            md5_digest,
        })
    }

    /// Stages a copy of the file at `path`.
    pub fn stage_file(&self, path: &Path) -> Result<StagedArtifact> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        self.stage(file)
    }

    /// Moves a staged artifact to its final location under `filename`.
    ///
    /// An artifact already stored under that name is set aside under a unique hidden name and
    /// restored if the returned placement is dropped without being committed.
    pub fn place(&self, staged: StagedArtifact, filename: &str) -> Result<Placement> {
        let target = self.resolve(&self.content_path(filename)?);

        let backup = if target.exists() {
            let upload_dir = self.upload_dir();
            let prefix = format!(".{filename}.");
            let reserved = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(BACKUP_SUFFIX)
                .tempfile_in(&upload_dir)
                .with_context(|| format!("reserving backup in {}", upload_dir.display()))?
                .into_temp_path();

            replace_file(&target, &reserved)?;
            let backup = reserved.keep().map_err(|err| {
                RegistryError::IoError {
                    action: format!("keeping backup of {}", target.display()),
                    source: err.error,
                }
            })?;
            Some(backup)
        } else {
            None
        };

        let placement = Placement {
            target,
            backup,
            committed: false,
        };

        staged.file.persist(&placement.target).map_err(|err| {
            RegistryError::IoError {
                action: format!("storing artifact {}", placement.target.display()),
                source: err.error,
            }
        })?;

        Ok(placement)
    }
}
