use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde_json::Value as JsonValue;
use wheelhouse_db::models::registry::{Distribution, Package, Review, User};

// ---- Protocol ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other,
}

/// A file part of a multipart upload, already written to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub filename: String,
}

/// A protocol request, independent of the HTTP framework that received it.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub files: Vec<(String, UploadedFile)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            content_type: None,
            authorization: None,
            query: Vec::new(),
            form: Vec::new(),
            files: Vec::new(),
            body: Vec::new(),
        }
    }

    /// First value of the form field `name`.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        first_value(&self.form, name)
    }

    /// First value of the query parameter `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        first_value(&self.query, name)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, file)| file)
    }

    /// Whether the body is an XML-RPC call.
    pub fn is_xmlrpc(&self) -> bool {
        self.method == Method::Post
            && self.content_type.as_deref().is_some_and(|content_type| {
                content_type
                    .split(';')
                    .next()
                    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/xml"))
            })
    }
}

fn first_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// A protocol response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    fn with_type(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_type(status, "text/plain; charset=utf-8", body)
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::with_type(status, "text/html; charset=utf-8", body)
    }

    pub fn xml(body: impl Into<String>) -> Self {
        Self::with_type(200, "text/xml", body)
    }

    pub fn redirect(location: &str) -> Self {
        let mut response = Self::text(302, format!("Redirecting to {location}\n"));
        response
            .headers
            .push(("Location".to_string(), location.to_string()));
        response
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::text(404, message)
    }

    /// A `405 Method Not Allowed` listing the permitted actions.
    pub fn not_allowed(allowed: &[&str]) -> Self {
        let mut response = Self::text(405, "Method not allowed\n");
        response
            .headers
            .push(("Allow".to_string(), allowed.join(", ")));
        response
    }

    pub fn unauthorized(realm: &str) -> Self {
        let mut response = Self::text(401, "Authentication required\n");
        response.headers.push((
            "WWW-Authenticate".to_string(),
            format!("Basic realm=\"{realm}\""),
        ));
        response
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// ---- Queries ----

/// A downloadable file of a release, as reported by `release_urls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseUrl {
    pub url: String,
    pub packagetype: String,
    pub filename: String,
    pub size: i64,
    pub md5_digest: String,
    pub has_sig: bool,
    pub python_version: String,
    pub comment_text: String,
}

/// Stored metadata of one release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseData {
    pub name: String,
    pub version: String,
    pub metadata_version: String,
    pub classifiers: Vec<String>,
    pub package_info: JsonValue,
}

/// A release with its files.
#[derive(Debug, Clone)]
pub struct ReleaseDetail {
    pub version: String,
    pub hidden: bool,
    pub created_at: String,
    pub files: Vec<Distribution>,
}

/// Everything the registry knows about a package.
#[derive(Debug, Clone)]
pub struct PackageDetail {
    pub package: Package,
    pub owner: Option<User>,
    pub classifiers: Vec<String>,
    pub releases: Vec<ReleaseDetail>,
    pub reviews: Vec<Review>,
}

/// One row of the package listing.
#[derive(Debug, Clone)]
pub struct PackageSummary {
    pub name: String,
    pub owner: Option<String>,
    pub license: String,
    pub releases: usize,
    pub latest: Option<String>,
}

// ---- Batch ingestion ----

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    Added { name: String, version: String },
    AlreadyAdded { name: String, version: String },
    NotFound,
    Failed(String),
}

/// Outcome of ingesting one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestEntry {
    pub label: String,
    pub status: IngestStatus,
}

impl IngestEntry {
    /// Whether the label was added or was already present.
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            IngestStatus::Added { .. } | IngestStatus::AlreadyAdded { .. }
        )
    }
}

impl fmt::Display for IngestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            IngestStatus::Added { name, version } => write!(f, "{name}-{version} added"),
            IngestStatus::AlreadyAdded { name, version } => {
                write!(f, "{name}-{version} already added")
            }
            IngestStatus::NotFound => write!(f, "Could not add {}. Not found.", self.label),
            IngestStatus::Failed(reason) => {
                write!(f, "Could not add {}. Failed: {reason}", self.label)
            }
        }
    }
}

/// Report returned after a batch ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub entries: Vec<IngestEntry>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(IngestEntry::is_success)
    }

    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            let key = match entry.status {
                IngestStatus::Added { .. } => "added",
                IngestStatus::AlreadyAdded { .. } => "already added",
                IngestStatus::NotFound => "not found",
                IngestStatus::Failed(_) => "failed",
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_xmlrpc() {
        let mut request = Request::new(Method::Post);
        request.content_type = Some("text/xml; charset=utf-8".into());
        assert!(request.is_xmlrpc());

        request.content_type = Some("multipart/form-data; boundary=x".into());
        assert!(!request.is_xmlrpc());

        let mut request = Request::new(Method::Get);
        request.content_type = Some("text/xml".into());
        assert!(!request.is_xmlrpc());
    }

    #[test]
    fn test_not_allowed_lists_actions() {
        let response = Response::not_allowed(&["file_upload", "submit"]);
        assert_eq!(response.status, 405);
        assert_eq!(response.header("allow"), Some("file_upload, submit"));
    }

    #[test]
    fn test_ingest_lines() {
        let added = IngestEntry {
            label: "demo".into(),
            status: IngestStatus::Added {
                name: "demo".into(),
                version: "1.0".into(),
            },
        };
        let missing = IngestEntry {
            label: "ghost".into(),
            status: IngestStatus::NotFound,
        };
        assert_eq!(added.to_string(), "demo-1.0 added");
        assert_eq!(missing.to_string(), "Could not add ghost. Not found.");

        let report = IngestReport {
            entries: vec![added.clone()],
        };
        assert!(report.is_success());

        let report = IngestReport {
            entries: vec![added, missing],
        };
        assert!(!report.is_success());
        assert_eq!(report.counts().get("not found"), Some(&1));
    }
}
