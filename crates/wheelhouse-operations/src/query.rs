//! Read-only registry queries.

use tracing::{debug, info};
use wheelhouse_db::repository::{
    classifier::ClassifierRepository, distribution::DistributionRepository,
    package::PackageRepository, release::ReleaseRepository, review::ReviewRepository,
    user::UserRepository,
};

use crate::{
    context::RegistryContext,
    error::{OperationError, Result},
    PackageDetail, PackageSummary, ReleaseData, ReleaseDetail, ReleaseUrl,
};

/// Names of every registered package, sorted.
pub fn list_packages(ctx: &RegistryContext) -> Result<Vec<String>> {
    Ok(ctx.db().with_conn(PackageRepository::list_names)?)
}

/// Versions of a package, newest first.
///
/// Hidden releases are only included when `show_hidden` is set. Unknown packages have no
/// versions.
pub fn package_releases(
    ctx: &RegistryContext,
    name: &str,
    show_hidden: bool,
) -> Result<Vec<String>> {
    let versions = ctx.db().with_conn(|conn| {
        let Some(package) = PackageRepository::find_by_name(conn, name)? else {
            return Ok(Vec::new());
        };
        let releases = ReleaseRepository::list_for_package(conn, package.id, show_hidden)?;
        Ok(releases.into_iter().rev().map(|release| release.version).collect())
    })?;

    debug!(name, count = versions.len(), "listed releases");
    Ok(versions)
}

/// Download locations of the files of a release.
pub fn release_urls(ctx: &RegistryContext, name: &str, version: &str) -> Result<Vec<ReleaseUrl>> {
    let files = ctx.db().with_conn(|conn| {
        match ReleaseRepository::find_by_name(conn, name, version)? {
            Some(release) => DistributionRepository::list_for_release(conn, release.id),
            None => Ok(Vec::new()),
        }
    })?;

    Ok(files
        .into_iter()
        .map(|file| {
            ReleaseUrl {
                url: ctx.media_url(&file.content),
                packagetype: file.filetype,
                filename: file.filename,
                size: file.size,
                md5_digest: file.md5_digest,
                has_sig: file.signature.is_some_and(|sig| !sig.is_empty()),
                python_version: file.pyversion,
                comment_text: file.comment.unwrap_or_default(),
            }
        })
        .collect())
}

/// Stored metadata of a release, or `None` if the release does not exist.
pub fn release_data(
    ctx: &RegistryContext,
    name: &str,
    version: &str,
) -> Result<Option<ReleaseData>> {
    Ok(ctx.db().with_conn(|conn| {
        let Some(package) = PackageRepository::find_by_name(conn, name)? else {
            return Ok(None);
        };
        let Some(release) = ReleaseRepository::find(conn, package.id, version)? else {
            return Ok(None);
        };
        let classifiers = ClassifierRepository::list_for_package(conn, package.id)?;

        Ok(Some(ReleaseData {
            name: package.name,
            version: release.version,
            metadata_version: release.metadata_version,
            classifiers,
            package_info: release.package_info,
        }))
    })?)
}

/// Every known classifier, sorted.
pub fn list_classifiers(ctx: &RegistryContext) -> Result<Vec<String>> {
    Ok(ctx.db().with_conn(ClassifierRepository::list_names)?)
}

/// One summary row per package.
///
/// The release count includes hidden releases; `latest` is the newest visible one.
pub fn package_summaries(ctx: &RegistryContext) -> Result<Vec<PackageSummary>> {
    Ok(ctx.db().with_conn(|conn| {
        let mut summaries = Vec::new();
        for package in PackageRepository::list_all(conn)? {
            let owner = match package.owner_id {
                Some(id) => UserRepository::find_by_id(conn, id)?.map(|user| user.username),
                None => None,
            };
            let releases = ReleaseRepository::count_for_package(conn, package.id)?;
            let latest = ReleaseRepository::list_for_package(conn, package.id, false)?
                .pop()
                .map(|release| release.version);
            summaries.push(PackageSummary {
                name: package.name,
                owner,
                license: package.license,
                releases: releases as usize,
                latest,
            });
        }
        Ok(summaries)
    })?)
}

/// Hides or reveals one release of a package.
///
/// Hidden releases stay downloadable but are left out of version listings unless explicitly
/// requested.
pub fn set_release_hidden(
    ctx: &RegistryContext,
    name: &str,
    version: &str,
    hidden: bool,
) -> Result<()> {
    let updated = ctx.db().with_conn(|conn| {
        match ReleaseRepository::find_by_name(conn, name, version)? {
            Some(release) => ReleaseRepository::set_hidden(conn, release.id, hidden),
            None => Ok(0),
        }
    })?;

    if updated == 0 {
        return Err(OperationError::ReleaseNotFound {
            name: name.to_string(),
            version: version.to_string(),
        });
    }
    info!(name, version, hidden, "release visibility changed");
    Ok(())
}

/// Full record of one package, including hidden releases.
pub fn package_detail(ctx: &RegistryContext, name: &str) -> Result<PackageDetail> {
    let detail = ctx.db().with_conn(|conn| {
        let Some(package) = PackageRepository::find_by_name(conn, name)? else {
            return Ok(None);
        };
        let owner = match package.owner_id {
            Some(id) => UserRepository::find_by_id(conn, id)?,
            None => None,
        };
        let classifiers = ClassifierRepository::list_for_package(conn, package.id)?;
        let reviews = ReviewRepository::list_for_package(conn, package.id)?;

        let mut releases = Vec::new();
        for release in ReleaseRepository::list_for_package(conn, package.id, true)? {
            let files = DistributionRepository::list_for_release(conn, release.id)?;
            releases.push(ReleaseDetail {
                version: release.version,
                hidden: release.hidden,
                created_at: release.created_at,
                files,
            });
        }

        Ok(Some(PackageDetail {
            package,
            owner,
            classifiers,
            releases,
            reviews,
        }))
    })?;

    detail.ok_or_else(|| OperationError::PackageNotFound(name.to_string()))
}
