//! Resolution of package labels against an upstream simple index.
//!
//! A label is either a URL, a path to a local archive, or a requirement of the form
//! `name` / `name==version`. Requirements are looked up on the project page of a PEP 503
//! index and the newest matching archive is downloaded.

use std::{cmp::Ordering, path::Path, sync::LazyLock};

use regex::Regex;
use tracing::{debug, warn};
use url::Url;
use wheelhouse_utils::string::normalize_name;

use crate::{
    download::{copy_local, Download},
    error::{DownloadError, Result},
    http::Http,
    traits::{Fetch, FetchedArtifact},
    utils::{filename_from_url, is_url, split_md5_fragment},
};

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>([^<]*)</a>"#)
        .expect("unable to compile index link regex")
});

static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:==\s*(\S+))?$")
        .expect("unable to compile requirement regex")
});

/// Archive suffixes in order of preference when a version ships several files.
const ARCHIVE_SUFFIXES: [&str; 6] = [".tar.gz", ".tgz", ".zip", ".tar", ".egg", ".whl"];

/// A `name[==version]` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub version: Option<String>,
}

impl Requirement {
    pub fn parse(label: &str) -> Option<Self> {
        let caps = REQUIREMENT_RE.captures(label.trim())?;
        Some(Self {
            name: caps[1].to_string(),
            version: caps.get(2).map(|m| m.as_str().to_string()),
        })
    }
}

/// A distribution link found on an index project page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLink {
    pub filename: String,
    pub url: String,
    pub md5_digest: Option<String>,
}

impl IndexLink {
    /// Version of `project` this file belongs to, if the file is a supported archive.
    pub fn version(&self, project: &str) -> Option<String> {
        archive_version(&self.filename, project)
    }

    fn suffix_rank(&self) -> usize {
        let lower = self.filename.to_ascii_lowercase();
        ARCHIVE_SUFFIXES
            .iter()
            .position(|suffix| lower.ends_with(suffix))
            .unwrap_or(ARCHIVE_SUFFIXES.len())
    }
}

/// Parses the anchors of a simple index page, resolving hrefs against `page_url`.
pub fn parse_links(html: &str, page_url: &str) -> Vec<IndexLink> {
    let base = Url::parse(page_url).ok();

    LINK_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let href = caps[1].replace("&amp;", "&");
            let url = match &base {
                Some(base) => base.join(&href).ok()?.to_string(),
                None => href,
            };
            let (location, md5_digest) = split_md5_fragment(&url);
            let text = caps[2].trim();
            let filename = if text.is_empty() {
                filename_from_url(location)?
            } else {
                text.to_string()
            };

            Some(IndexLink {
                filename,
                url: location.to_string(),
                md5_digest: md5_digest.map(str::to_ascii_lowercase),
            })
        })
        .collect()
}

/// Extracts the version from an archive named after `project`.
///
/// Sdists are named `<project>-<version><suffix>`; eggs and wheels append further
/// dash-separated tags after the version. Versions start with a digit.
pub fn archive_version(filename: &str, project: &str) -> Option<String> {
    let lower = filename.to_ascii_lowercase();
    let suffix = ARCHIVE_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix))?;
    let stem = &filename[..filename.len() - suffix.len()];
    let tagged = matches!(*suffix, ".egg" | ".whl");
    let project = normalize_name(project);

    stem.match_indices('-').find_map(|(pos, _)| {
        if normalize_name(&stem[..pos]) != project {
            return None;
        }
        let rest = &stem[pos + 1..];
        let version = if tagged {
            rest.split('-').next().unwrap_or_default()
        } else {
            rest
        };
        version
            .starts_with(|c: char| c.is_ascii_digit())
            .then(|| version.to_string())
    })
}

/// Orders release versions numerically, component by component.
///
/// A component with a trailing qualifier (`0rc1`) sorts before the bare number, so
/// pre-releases lose against their final release.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn component(part: &str) -> (u64, &str) {
        let digits = part.len() - part.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        (part[..digits].parse().unwrap_or(0), &part[digits..])
    }

    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let (ln, ls) = component(l);
                let (rn, rs) = component(r);
                let ordering = ln.cmp(&rn).then_with(|| {
                    match (ls.is_empty(), rs.is_empty()) {
                        (true, true) => Ordering::Equal,
                        (true, false) => Ordering::Greater,
                        (false, true) => Ordering::Less,
                        (false, false) => ls.cmp(rs),
                    }
                });
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Picks the link to fetch for `requirement`: the requested version, or the newest one.
pub fn select_link<'a>(links: &'a [IndexLink], requirement: &Requirement) -> Option<&'a IndexLink> {
    links
        .iter()
        .filter_map(|link| {
            let version = link.version(&requirement.name)?;
            match &requirement.version {
                Some(wanted) if *wanted != version => None,
                _ => Some((version, link)),
            }
        })
        .max_by(|(va, la), (vb, lb)| {
            compare_versions(va, vb).then_with(|| lb.suffix_rank().cmp(&la.suffix_rank()))
        })
        .map(|(_, link)| link)
}

/// A [`Fetch`] implementation backed by a PEP 503 simple index.
#[derive(Debug, Clone)]
pub struct PackageIndex {
    base_url: String,
}

impl PackageIndex {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the project page for `name`.
    pub fn project_url(&self, name: &str) -> String {
        format!("{}/{}/", self.base_url, normalize_name(name))
    }

    fn fetch_requirement(
        &self,
        requirement: &Requirement,
        dest_dir: &Path,
    ) -> Result<Option<FetchedArtifact>> {
        let page_url = self.project_url(&requirement.name);
        let html = match Http::text(&page_url) {
            Ok(html) => html,
            Err(err) if err.is_not_found() => {
                debug!(url = page_url.as_str(), "project not on index");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let links = parse_links(&html, &page_url);
        let Some(link) = select_link(&links, requirement) else {
            warn!(
                name = requirement.name.as_str(),
                files = links.len(),
                "no matching distribution on index"
            );
            return Ok(None);
        };

        let url = match &link.md5_digest {
            Some(digest) => format!("{}#md5={digest}", link.url),
            None => link.url.clone(),
        };
        Download::new(url, dest_dir)
            .filename(link.filename.clone())
            .execute()
            .map(Some)
    }
}

impl Fetch for PackageIndex {
    fn fetch(&self, label: &str, dest_dir: &Path) -> Result<Option<FetchedArtifact>> {
        if is_url(label) {
            return match Download::new(label, dest_dir).execute() {
                Ok(fetched) => Ok(Some(fetched)),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err),
            };
        }

        let path = Path::new(label);
        if path.is_file() {
            return copy_local(path, dest_dir).map(Some);
        }

        let requirement =
            Requirement::parse(label).ok_or_else(|| DownloadError::InvalidLabel(label.to_string()))?;
        self.fetch_requirement(&requirement, dest_dir)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<h1>Links for demo</h1>
<a href="../../packages/demo-1.0.tar.gz#md5=AAAA">demo-1.0.tar.gz</a><br/>
<a href="../../packages/demo-1.2.zip">demo-1.2.zip</a><br/>
<a href="../../packages/demo-1.2.tar.gz#md5=bbbb">demo-1.2.tar.gz</a><br/>
<a href="../../packages/demo-1.10rc1.tar.gz">demo-1.10rc1.tar.gz</a><br/>
<a href="../../packages/demo-1.3-py2.7.egg">demo-1.3-py2.7.egg</a><br/>
<a href="../../packages/demo-2.0.exe">demo-2.0.exe</a><br/>
<a href="../../packages/demo_ext-9.0.tar.gz">demo_ext-9.0.tar.gz</a><br/>
</body></html>"#;

    fn links() -> Vec<IndexLink> {
        parse_links(PAGE, "https://index.example/simple/demo/")
    }

    #[test]
    fn test_requirement_parse() {
        assert_eq!(
            Requirement::parse("Demo"),
            Some(Requirement {
                name: "Demo".into(),
                version: None
            })
        );
        assert_eq!(
            Requirement::parse("demo.ext == 1.2"),
            Some(Requirement {
                name: "demo.ext".into(),
                version: Some("1.2".into())
            })
        );
        assert_eq!(Requirement::parse("demo>=1.0"), None);
        assert_eq!(Requirement::parse(""), None);
    }

    #[test]
    fn test_parse_links() {
        let links = links();
        assert_eq!(links.len(), 7);
        assert_eq!(
            links[0],
            IndexLink {
                filename: "demo-1.0.tar.gz".into(),
                url: "https://index.example/packages/demo-1.0.tar.gz".into(),
                md5_digest: Some("aaaa".into()),
            }
        );
        assert!(links[1].md5_digest.is_none());
    }

    #[test]
    fn test_archive_version() {
        assert_eq!(archive_version("demo-1.0.tar.gz", "demo").as_deref(), Some("1.0"));
        assert_eq!(
            archive_version("Demo_Ext-2.1b1.zip", "demo-ext").as_deref(),
            Some("2.1b1")
        );
        assert_eq!(
            archive_version("demo-1.3-py2.7.egg", "demo").as_deref(),
            Some("1.3")
        );
        assert_eq!(
            archive_version("demo-1.3-py3-none-any.whl", "demo").as_deref(),
            Some("1.3")
        );
        assert_eq!(archive_version("demo_ext-9.0.tar.gz", "demo"), None);
        assert_eq!(archive_version("demo-ext-9.0.tar.gz", "demo"), None);
        assert_eq!(archive_version("demo-2.0.exe", "demo"), None);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.1", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0rc1", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0a1", "1.0b1"), Ordering::Less);
    }

    #[test]
    fn test_select_newest() {
        let links = links();
        let requirement = Requirement::parse("demo").unwrap();
        let link = select_link(&links, &requirement).unwrap();
        assert_eq!(link.filename, "demo-1.10rc1.tar.gz");
    }

    #[test]
    fn test_select_pinned_prefers_sdist() {
        let links = links();
        let requirement = Requirement::parse("demo==1.2").unwrap();
        let link = select_link(&links, &requirement).unwrap();
        assert_eq!(link.filename, "demo-1.2.tar.gz");
        assert_eq!(link.md5_digest.as_deref(), Some("bbbb"));

        let missing = Requirement::parse("demo==2.0").unwrap();
        assert!(select_link(&links, &missing).is_none());
    }

    #[test]
    fn test_project_url() {
        let index = PackageIndex::new("https://pypi.org/simple/");
        assert_eq!(index.base_url(), "https://pypi.org/simple");
        assert_eq!(index.project_url("Zope.Interface"), "https://pypi.org/simple/zope-interface/");
    }

    #[test]
    fn test_fetch_local_path() {
        let src = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let archive = src.path().join("demo-1.0.tar.gz");
        fs::write(&archive, b"archive").unwrap();

        let index = PackageIndex::new("https://index.invalid/simple");
        let fetched = index
            .fetch(archive.to_str().unwrap(), dest.path())
            .unwrap()
            .unwrap();
        assert_eq!(fetched.filename, "demo-1.0.tar.gz");
        assert!(fetched.path.starts_with(dest.path()));
    }

    #[test]
    fn test_fetch_invalid_label() {
        let dest = tempdir().unwrap();
        let index = PackageIndex::new("https://index.invalid/simple");
        let err = index.fetch("demo >= 1.0", dest.path()).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidLabel(_)));
    }
}
