//! Descriptor parsing.
//!
//! A descriptor is the raw, untyped metadata a distribution declares about itself: the
//! RFC 822 style `PKG-INFO`/`METADATA` file embedded in an archive, or the form fields sent
//! alongside an upload. Field names are normalized to their snake_case registry names and
//! every field may carry several values.

use std::collections::BTreeMap;

use crate::error::{PackageError, Result};

/// Metadata version assumed when a descriptor does not declare one.
pub const DEFAULT_METADATA_VERSION: &str = "1.0";

/// Form fields of the upload protocol that describe the request rather than the package.
const PROTOCOL_FIELDS: &[&str] = &[
    ":action",
    "protocol_version",
    "content",
    "filetype",
    "pyversion",
    "md5_digest",
    "sha256_digest",
    "blake2_256_digest",
    "comment",
    "gpg_signature",
];

/// Raw metadata declared by a distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    fields: BTreeMap<String, Vec<String>>,
}

impl Descriptor {
    /// Parses `PKG-INFO`/`METADATA` content.
    ///
    /// Continuation lines are folded into the previous header, and a message body following
    /// the headers is used as the description when no `Description` header was present.
    ///
    /// # Errors
    ///
    /// * [`PackageError::MetadataUnreadable`] if the content declares no `Name`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut descriptor = Descriptor::default();
        let mut current: Option<(String, String)> = None;
        let mut lines = content.lines();

        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push('\n');
                    value.push_str(strip_continuation(line));
                }
            } else if let Some((key, value)) = line.split_once(':') {
                if let Some((key, value)) = current.take() {
                    descriptor.push(&key, value);
                }
                current = Some((key.trim().to_string(), value.trim().to_string()));
            }
        }

        if let Some((key, value)) = current {
            descriptor.push(&key, value);
        }

        let body = lines.collect::<Vec<_>>().join("\n");
        let body = body.trim();
        if !body.is_empty() && descriptor.get("description").is_none() {
            descriptor.push("description", body.to_string());
        }

        if descriptor.name().is_empty() {
            return Err(PackageError::unreadable(
                "descriptor",
                "missing required Name field",
            ));
        }

        Ok(descriptor)
    }

    /// Builds a descriptor from the form fields of an upload or registration request.
    ///
    /// Protocol fields such as `:action`, `content` or `md5_digest` are skipped.
    pub fn from_form<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut descriptor = Descriptor::default();
        for (key, value) in fields {
            if PROTOCOL_FIELDS.contains(&key) {
                continue;
            }
            descriptor.push(key, value.to_string());
        }
        descriptor
    }

    fn push(&mut self, key: &str, value: String) {
        self.fields.entry(normalize_key(key)).or_default().push(value);
    }

    /// Returns the first value of `field`, ignoring empty values.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values(field)
            .iter()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// Returns every value declared for `field`.
    pub fn values(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over all declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn name(&self) -> &str {
        self.get("name").unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.get("version").unwrap_or_default()
    }

    pub fn metadata_version(&self) -> &str {
        self.get("metadata_version")
            .unwrap_or(DEFAULT_METADATA_VERSION)
    }

    pub fn author_email(&self) -> Option<&str> {
        self.get("author_email")
    }
}

/// Maps a header or form field name onto its registry field name.
///
/// Headers that may repeat are stored under their plural field names, so `Classifier` and the
/// upload form's `classifiers` both end up in `classifiers`.
fn normalize_key(key: &str) -> String {
    let key = key.trim().to_ascii_lowercase().replace('-', "_");
    match key.as_str() {
        "classifier" => "classifiers".to_string(),
        "platform" => "platforms".to_string(),
        "supported_platform" => "supported_platforms".to_string(),
        "home_page" | "homepage" => "home_page".to_string(),
        _ => key,
    }
}

/// Strips the indentation distutils and setuptools put in front of folded header lines.
fn strip_continuation(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    let indent = line.len() - trimmed.len();
    if indent == 7 || indent == 8 {
        if let Some(rest) = trimmed.strip_prefix('|') {
            return rest;
        }
    }
    trimmed.trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PKG_INFO: &str = "Metadata-Version: 1.1
Name: demo
Version: 1.0
Summary: A demo package
Home-page: https://example.com/demo
Author: Alice
Author-email: alice@example.com
License: MIT
Description: First line
        second line
Classifier: Programming Language :: Python
Classifier: License :: OSI Approved :: MIT License
Platform: UNKNOWN
";

    #[test]
    fn test_parse_pkg_info() {
        let descriptor = Descriptor::parse(PKG_INFO).unwrap();

        assert_eq!(descriptor.name(), "demo");
        assert_eq!(descriptor.version(), "1.0");
        assert_eq!(descriptor.metadata_version(), "1.1");
        assert_eq!(descriptor.author_email(), Some("alice@example.com"));
        assert_eq!(descriptor.get("home_page"), Some("https://example.com/demo"));
        assert_eq!(descriptor.get("description"), Some("First line\nsecond line"));
        assert_eq!(descriptor.values("classifiers").len(), 2);
        assert_eq!(descriptor.values("platforms"), ["UNKNOWN"]);
    }

    #[test]
    fn test_parse_setuptools_pipe_continuation() {
        let content = "Name: demo\nVersion: 2.0\nDescription: Title\n       |\n       |Body text\n";
        let descriptor = Descriptor::parse(content).unwrap();

        assert_eq!(descriptor.get("description"), Some("Title\n\nBody text"));
        assert_eq!(descriptor.metadata_version(), DEFAULT_METADATA_VERSION);
    }

    #[test]
    fn test_parse_keeps_indented_blank_lines() {
        let content = "Name: demo\nVersion: 1.0\nDescription: Intro\n        \n        More\nLicense: BSD\n";
        let descriptor = Descriptor::parse(content).unwrap();

        assert_eq!(descriptor.get("description"), Some("Intro\n\nMore"));
        assert_eq!(descriptor.get("license"), Some("BSD"));
    }

    #[test]
    fn test_parse_body_as_description() {
        let content = "Metadata-Version: 1.2\nName: demo\nVersion: 1.0\n\n# Demo\n\nLong text.\n";
        let descriptor = Descriptor::parse(content).unwrap();

        assert_eq!(descriptor.get("description"), Some("# Demo\n\nLong text."));
    }

    #[test]
    fn test_parse_missing_name() {
        let result = Descriptor::parse("Metadata-Version: 1.0\nVersion: 1.0\n");
        assert!(matches!(
            result,
            Err(PackageError::MetadataUnreadable { .. })
        ));
    }

    #[test]
    fn test_from_form_skips_protocol_fields() {
        let descriptor = Descriptor::from_form([
            (":action", "file_upload"),
            ("metadata_version", "1.0"),
            ("name", "demo"),
            ("version", "1.0"),
            ("md5_digest", "abc"),
            ("classifiers", "Topic :: Utilities"),
            ("classifiers", "Programming Language :: Python"),
            ("platform", "linux"),
        ]);

        assert_eq!(descriptor.name(), "demo");
        assert_eq!(descriptor.values("classifiers").len(), 2);
        assert_eq!(descriptor.values("platforms"), ["linux"]);
        assert!(descriptor.values("md5_digest").is_empty());
        assert!(descriptor.values(":action").is_empty());
    }

    #[test]
    fn test_get_ignores_blank_values() {
        let descriptor = Descriptor::from_form([("name", "demo"), ("license", "  ")]);
        assert_eq!(descriptor.get("license"), None);
    }
}
