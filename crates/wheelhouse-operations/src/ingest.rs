//! Batch ingestion of packages fetched from an upstream index.

use tempfile::Builder;
use tracing::{debug, warn};
use wheelhouse_core::publish::{Artifact, PublishOutcome, PublishRequest};
use wheelhouse_dl::traits::Fetch;

use crate::{context::RegistryContext, IngestEntry, IngestReport, IngestStatus};

/// Fetches and publishes every label, continuing past failures.
///
/// Each label is fetched into its own temporary directory, removed once the label is done.
/// Labels that cannot be fetched are reported as not found.
pub fn ingest_labels<F: Fetch>(
    ctx: &RegistryContext,
    fetcher: &F,
    labels: &[String],
    owner: Option<&str>,
) -> IngestReport {
    let entries = labels
        .iter()
        .map(|label| {
            IngestEntry {
                label: label.clone(),
                status: ingest_label(ctx, fetcher, label, owner),
            }
        })
        .collect();

    IngestReport { entries }
}

fn ingest_label<F: Fetch>(
    ctx: &RegistryContext,
    fetcher: &F,
    label: &str,
    owner: Option<&str>,
) -> IngestStatus {
    let workdir = match Builder::new().prefix("wheelhouse.").tempdir() {
        Ok(dir) => dir,
        Err(err) => return IngestStatus::Failed(format!("cannot create work directory: {err}")),
    };

    let fetched = match fetcher.fetch(label, workdir.path()) {
        Ok(Some(fetched)) => fetched,
        Ok(None) => {
            debug!(label, "no artifact found");
            return IngestStatus::NotFound;
        }
        Err(err) => {
            warn!(label, "fetch failed: {err}");
            return IngestStatus::NotFound;
        }
    };
    debug!(
        label,
        filename = fetched.filename.as_str(),
        "fetched artifact"
    );

    let request = PublishRequest {
        artifact: Some(Artifact::new(fetched.path, fetched.filename)),
        owner: owner.map(str::to_string),
        md5_digest: fetched.md5_digest,
        ..Default::default()
    };

    match ctx.publisher().publish(&request) {
        Ok(PublishOutcome::Published(release)) => {
            IngestStatus::Added {
                name: release.name,
                version: release.version,
            }
        }
        Ok(PublishOutcome::AlreadyPublished { name, version }) => {
            IngestStatus::AlreadyAdded { name, version }
        }
        Err(err) => IngestStatus::Failed(err.to_string()),
    }
}
