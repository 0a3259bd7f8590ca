use std::{
    fs::File,
    path::{Path, PathBuf},
};

use tracing::debug;
use ureq::http::header::CONTENT_DISPOSITION;
use wheelhouse_utils::{hash::copy_with_checksum, path::plain_filename};

use crate::{
    error::{DownloadError, Result},
    http::Http,
    traits::FetchedArtifact,
    utils::{filename_from_header, filename_from_url, split_md5_fragment},
};

/// A single artifact download.
pub struct Download {
    pub url: String,
    pub output_dir: PathBuf,
    pub filename: Option<String>,
}

impl Download {
    /// Creates a download of `url` into `output_dir`.
    ///
    /// A `#md5=` fragment on the URL is kept as the expected digest and stripped from the
    /// request.
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            filename: None,
        }
    }

    /// Stores the artifact under `filename` instead of the name the server reports.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Streams the response body into the output directory.
    ///
    /// The returned artifact carries the digest advertised in the URL fragment, not the
    /// digest of the received bytes; checking the two is left to the publisher.
    pub fn execute(self) -> Result<FetchedArtifact> {
        let (url, md5_digest) = split_md5_fragment(&self.url);
        url::Url::parse(url).map_err(|source| {
            DownloadError::InvalidUrl {
                url: url.to_string(),
                source,
            }
        })?;

        debug!(url, "downloading artifact");
        let mut response = Http::fetch(url)?;

        let filename = self
            .filename
            .clone()
            .or_else(|| {
                response
                    .headers()
                    .get(CONTENT_DISPOSITION)
                    .and_then(filename_from_header)
            })
            .or_else(|| filename_from_url(url))
            .ok_or(DownloadError::NoFilename)?;
        let filename = plain_filename(&filename)
            .map_err(|_| DownloadError::NoFilename)?
            .to_string();

        let path = self.output_dir.join(&filename);
        let file = File::create(&path)?;
        let (size, _) = copy_with_checksum(response.body_mut().as_reader(), file)?;
        debug!(size, path = %path.display(), "download complete");

        Ok(FetchedArtifact {
            path,
            filename,
            md5_digest: md5_digest.map(str::to_string),
        })
    }
}

/// Copies a local archive into `dest_dir`, keeping its file name.
pub fn copy_local(source: &Path, dest_dir: &Path) -> Result<FetchedArtifact> {
    let filename = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or(DownloadError::NoFilename)?;

    let path = dest_dir.join(&filename);
    let (size, _) = copy_with_checksum(File::open(source)?, File::create(&path)?)?;
    debug!(size, source = %source.display(), "copied local artifact");

    Ok(FetchedArtifact {
        path,
        filename,
        md5_digest: None,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_copy_local() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let source = src.path().join("demo-1.0.tar.gz");
        fs::write(&source, b"archive").unwrap();

        let fetched = copy_local(&source, dest.path()).unwrap();
        assert_eq!(fetched.filename, "demo-1.0.tar.gz");
        assert_eq!(fetched.path, dest.path().join("demo-1.0.tar.gz"));
        assert_eq!(fs::read(&fetched.path).unwrap(), b"archive");
        assert!(fetched.md5_digest.is_none());
    }

    #[test]
    fn test_copy_missing_file() {
        let dest = tempdir().unwrap();
        let err = copy_local(&dest.path().join("missing.tar.gz"), dest.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_url() {
        let dest = tempdir().unwrap();
        let err = Download::new("not a url", dest.path()).execute().unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }
}
