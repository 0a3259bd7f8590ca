use nu_ansi_term::Color::{Blue, Cyan, LightRed, Magenta, Yellow};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{debug, info};
use wheelhouse_operations::{query, RegistryContext, Result};

use crate::utils::{format_bytes, Colored};

pub fn list_packages(ctx: &RegistryContext) -> Result<()> {
    let summaries = query::package_summaries(ctx)?;
    debug!(count = summaries.len(), "listing packages");

    if summaries.is_empty() {
        info!("No packages");
        return Ok(());
    }

    let mut builder = Builder::new();
    builder.push_record(["Package", "Latest", "Releases", "Owner", "License"]);
    for summary in &summaries {
        builder.push_record([
            Colored(Blue, &summary.name).to_string(),
            Colored(LightRed, summary.latest.as_deref().unwrap_or("-")).to_string(),
            summary.releases.to_string(),
            summary.owner.clone().unwrap_or_else(|| "-".into()),
            summary.license.clone(),
        ]);
    }

    let table = builder
        .build()
        .with(Panel::header(format!("Packages ({})", summaries.len())))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    info!("\n{table}");
    Ok(())
}

pub fn show_package(ctx: &RegistryContext, name: &str) -> Result<()> {
    let detail = query::package_detail(ctx, name)?;
    let package = &detail.package;

    info!(
        "{} {}",
        Colored(Blue, &package.name),
        package.summary.as_deref().unwrap_or_default()
    );
    info!(
        "Owner: {}",
        detail
            .owner
            .as_ref()
            .map(|owner| format!("{} <{}>", owner.username, owner.email))
            .unwrap_or_else(|| "-".into())
    );
    info!("License: {}", package.license);
    if let Some(home_page) = &package.home_page {
        info!("Home page: {}", Colored(Cyan, home_page));
    }
    for classifier in &detail.classifiers {
        info!("Classifier: {}", Colored(Magenta, classifier));
    }

    let mut builder = Builder::new();
    builder.push_record(["Version", "File", "Type", "Python", "Size", "MD5"]);
    for release in &detail.releases {
        let version = if release.hidden {
            format!("{} {}", release.version, Colored(Yellow, "(hidden)"))
        } else {
            release.version.clone()
        };

        if release.files.is_empty() {
            builder.push_record([version, "-".into(), "-".into(), "-".into(), "-".into(), "-".into()]);
            continue;
        }
        for file in &release.files {
            builder.push_record([
                Colored(LightRed, &version).to_string(),
                file.filename.clone(),
                file.filetype.clone(),
                file.pyversion.clone(),
                format_bytes(file.size),
                file.md5_digest.clone(),
            ]);
        }
    }

    let table = builder
        .build()
        .with(Panel::header("Releases"))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();
    info!("\n{table}");

    for review in &detail.reviews {
        info!(
            "Review{}: {}",
            review
                .rating
                .map(|rating| format!(" ({rating}/5)"))
                .unwrap_or_default(),
            review.comment
        );
    }

    Ok(())
}

pub fn set_release_hidden(
    ctx: &RegistryContext,
    name: &str,
    version: &str,
    hidden: bool,
) -> Result<()> {
    query::set_release_hidden(ctx, name, version, hidden)?;
    let state = if hidden { "hidden" } else { "visible" };
    info!(
        "{} {} is now {state}",
        Colored(Blue, name),
        Colored(LightRed, version)
    );
    Ok(())
}

pub fn list_classifiers(ctx: &RegistryContext) -> Result<()> {
    for classifier in query::list_classifiers(ctx)? {
        info!("{classifier}");
    }
    Ok(())
}
