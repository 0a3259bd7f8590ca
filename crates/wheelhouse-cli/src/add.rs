use nu_ansi_term::Color::{Green, Red, Yellow};
use tracing::{debug, error, info, warn};
use wheelhouse_core::error::ErrorContext;
use wheelhouse_dl::index::PackageIndex;
use wheelhouse_operations::{ingest::ingest_labels, IngestStatus, RegistryContext, Result};

use crate::utils::Colored;

/// Adds every label from the upstream index. Returns whether every label succeeded.
pub async fn add_packages(
    ctx: RegistryContext,
    labels: Vec<String>,
    owner: Option<String>,
) -> Result<bool> {
    let index = PackageIndex::new(ctx.config().proxy_base_url());
    debug!(index = index.base_url(), count = labels.len(), "adding packages");

    let report = tokio::task::spawn_blocking(move || {
        ingest_labels(&ctx, &index, &labels, owner.as_deref())
    })
    .await
    .map_err(std::io::Error::other)
    .with_context(|| "running batch ingestion".into())?;

    for entry in &report.entries {
        match &entry.status {
            IngestStatus::Added { .. } => info!("{}", Colored(Green, entry)),
            IngestStatus::AlreadyAdded { .. } => info!("{}", Colored(Yellow, entry)),
            IngestStatus::NotFound => warn!("{}", entry),
            IngestStatus::Failed(_) => error!("{}", Colored(Red, entry)),
        }
    }

    let counts = report.counts();
    debug!(?counts, "batch finished");

    if !report.is_success() && report.entries.len() > 1 {
        let failed = report.entries.iter().filter(|entry| !entry.is_success()).count();
        warn!("{failed} of {} packages could not be added", report.entries.len());
    }

    Ok(report.is_success())
}
