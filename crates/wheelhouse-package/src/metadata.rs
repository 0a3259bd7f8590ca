//! Metadata version resolution.
//!
//! Each metadata version defines the set of fields a distribution may declare. Versions are
//! cumulative: 1.1 extends 1.0 and 1.2 extends 1.1. A descriptor is projected onto the typed
//! form of its declared version, fields outside that version's set are dropped, and the
//! result is validated before anything is persisted.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    descriptor::Descriptor,
    error::{PackageError, Result},
};

/// License recorded when a distribution does not declare one.
pub const UNKNOWN_LICENSE: &str = "Unknown";

/// Fields defined by metadata version 1.0.
pub const FIELDS_1_0: &[&str] = &[
    "platforms",
    "summary",
    "description",
    "keywords",
    "home_page",
    "author",
    "author_email",
    "license",
];

/// Fields metadata version 1.1 adds to 1.0.
pub const FIELDS_1_1: &[&str] = &[
    "supported_platforms",
    "download_url",
    "classifiers",
    "requires",
    "provides",
    "obsoletes",
];

/// Fields metadata version 1.2 adds to 1.1.
pub const FIELDS_1_2: &[&str] = &[
    "maintainer",
    "maintainer_email",
    "requires_dist",
    "provides_dist",
    "obsoletes_dist",
    "requires_python",
    "requires_external",
    "project_url",
];

/// Fields that may be declared more than once.
pub const MULTI_VALUED_FIELDS: &[&str] = &[
    "platforms",
    "supported_platforms",
    "classifiers",
    "requires",
    "provides",
    "obsoletes",
    "requires_dist",
    "provides_dist",
    "obsoletes_dist",
    "requires_external",
    "project_url",
];

pub fn is_multi_valued(field: &str) -> bool {
    MULTI_VALUED_FIELDS.contains(&field)
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$")
        .expect("unable to compile package name regex")
});

/// Metadata versions understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataVersion {
    V1_0,
    V1_1,
    V1_2,
}

impl MetadataVersion {
    pub const ALL: [MetadataVersion; 3] = [
        MetadataVersion::V1_0,
        MetadataVersion::V1_1,
        MetadataVersion::V1_2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataVersion::V1_0 => "1.0",
            MetadataVersion::V1_1 => "1.1",
            MetadataVersion::V1_2 => "1.2",
        }
    }

    /// Returns every field this version defines, in declaration order.
    pub fn known_fields(&self) -> Vec<&'static str> {
        let additions: &[&[&str]] = match self {
            MetadataVersion::V1_0 => &[FIELDS_1_0],
            MetadataVersion::V1_1 => &[FIELDS_1_0, FIELDS_1_1],
            MetadataVersion::V1_2 => &[FIELDS_1_0, FIELDS_1_1, FIELDS_1_2],
        };
        additions.iter().flat_map(|fields| fields.iter().copied()).collect()
    }
}

impl FromStr for MetadataVersion {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1.0" => Ok(MetadataVersion::V1_0),
            "1.1" => Ok(MetadataVersion::V1_1),
            "1.2" => Ok(MetadataVersion::V1_2),
            other => Err(PackageError::UnsupportedMetadataVersion(other.to_string())),
        }
    }
}

impl fmt::Display for MetadataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads descriptor fields, honoring the set of fields the resolver allows.
struct Projection<'a> {
    descriptor: &'a Descriptor,
    allowed: &'a [String],
}

impl Projection<'_> {
    fn allows(&self, field: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == field)
    }

    fn single(&self, field: &str) -> Option<String> {
        if !self.allows(field) {
            return None;
        }
        self.descriptor.get(field).map(str::to_string)
    }

    fn multi(&self, field: &str) -> Vec<String> {
        if !self.allows(field) {
            return Vec::new();
        }
        self.descriptor
            .values(field)
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn push_single(
    entries: &mut Vec<(&'static str, Vec<String>)>,
    field: &'static str,
    value: &Option<String>,
) {
    entries.push((field, value.iter().cloned().collect()));
}

fn check_entries(field: &str, values: &[String]) -> Result<()> {
    if values.iter().any(|value| value.trim().is_empty()) {
        return Err(PackageError::invalid(field, "entries must not be empty"));
    }
    Ok(())
}

/// Metadata version 1.0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata10 {
    pub name: String,
    pub version: String,
    pub platforms: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub home_page: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub license: Option<String>,
}

impl Metadata10 {
    fn project(p: &Projection) -> Self {
        Self {
            name: p.descriptor.name().to_string(),
            version: p.descriptor.version().to_string(),
            platforms: p.multi("platforms"),
            summary: p.single("summary"),
            description: p.single("description"),
            keywords: p.single("keywords"),
            home_page: p.single("home_page"),
            author: p.single("author"),
            author_email: p.single("author_email"),
            license: p.single("license"),
        }
    }

    /// Checks the structural constraints shared by every metadata version.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PackageError::invalid("name", "missing package name"));
        }
        if !NAME_RE.is_match(&self.name) {
            return Err(PackageError::invalid(
                "name",
                format!("`{}` is not a valid package name", self.name),
            ));
        }
        if self.version.is_empty() {
            return Err(PackageError::invalid("version", "missing package version"));
        }
        if self.version.chars().any(char::is_whitespace) {
            return Err(PackageError::invalid(
                "version",
                format!("`{}` contains whitespace", self.version),
            ));
        }
        check_entries("platforms", &self.platforms)
    }

    fn entries(&self, entries: &mut Vec<(&'static str, Vec<String>)>) {
        entries.push(("platforms", self.platforms.clone()));
        push_single(entries, "summary", &self.summary);
        push_single(entries, "description", &self.description);
        push_single(entries, "keywords", &self.keywords);
        push_single(entries, "home_page", &self.home_page);
        push_single(entries, "author", &self.author);
        push_single(entries, "author_email", &self.author_email);
        entries.push((
            "license",
            vec![self.license.clone().unwrap_or_else(|| UNKNOWN_LICENSE.to_string())],
        ));
    }
}

/// Metadata version 1.1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata11 {
    pub base: Metadata10,
    pub supported_platforms: Vec<String>,
    pub download_url: Option<String>,
    pub classifiers: Vec<String>,
    pub requires: Vec<String>,
    pub provides: Vec<String>,
    pub obsoletes: Vec<String>,
}

impl Metadata11 {
    fn project(p: &Projection) -> Self {
        Self {
            base: Metadata10::project(p),
            supported_platforms: p.multi("supported_platforms"),
            download_url: p.single("download_url"),
            classifiers: p.multi("classifiers"),
            requires: p.multi("requires"),
            provides: p.multi("provides"),
            obsoletes: p.multi("obsoletes"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        check_entries("supported_platforms", &self.supported_platforms)?;
        check_entries("classifiers", &self.classifiers)?;
        check_entries("requires", &self.requires)?;
        check_entries("provides", &self.provides)?;
        check_entries("obsoletes", &self.obsoletes)
    }

    fn entries(&self, entries: &mut Vec<(&'static str, Vec<String>)>) {
        self.base.entries(entries);
        entries.push(("supported_platforms", self.supported_platforms.clone()));
        push_single(entries, "download_url", &self.download_url);
        entries.push(("classifiers", self.classifiers.clone()));
        entries.push(("requires", self.requires.clone()));
        entries.push(("provides", self.provides.clone()));
        entries.push(("obsoletes", self.obsoletes.clone()));
    }
}

/// Metadata version 1.2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata12 {
    pub base: Metadata11,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub requires_dist: Vec<String>,
    pub provides_dist: Vec<String>,
    pub obsoletes_dist: Vec<String>,
    pub requires_python: Option<String>,
    pub requires_external: Vec<String>,
    pub project_url: Vec<String>,
}

impl Metadata12 {
    fn project(p: &Projection) -> Self {
        Self {
            base: Metadata11::project(p),
            maintainer: p.single("maintainer"),
            maintainer_email: p.single("maintainer_email"),
            requires_dist: p.multi("requires_dist"),
            provides_dist: p.multi("provides_dist"),
            obsoletes_dist: p.multi("obsoletes_dist"),
            requires_python: p.single("requires_python"),
            requires_external: p.multi("requires_external"),
            project_url: p.multi("project_url"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        check_entries("requires_dist", &self.requires_dist)?;
        check_entries("provides_dist", &self.provides_dist)?;
        check_entries("obsoletes_dist", &self.obsoletes_dist)?;
        check_entries("requires_external", &self.requires_external)?;

        for entry in &self.project_url {
            let well_formed = entry
                .split_once(',')
                .is_some_and(|(label, url)| !label.trim().is_empty() && !url.trim().is_empty());
            if !well_formed {
                return Err(PackageError::invalid(
                    "project_url",
                    format!("`{entry}` is not of the form `label, url`"),
                ));
            }
        }

        Ok(())
    }

    fn entries(&self, entries: &mut Vec<(&'static str, Vec<String>)>) {
        self.base.entries(entries);
        push_single(entries, "maintainer", &self.maintainer);
        push_single(entries, "maintainer_email", &self.maintainer_email);
        entries.push(("requires_dist", self.requires_dist.clone()));
        entries.push(("provides_dist", self.provides_dist.clone()));
        entries.push(("obsoletes_dist", self.obsoletes_dist.clone()));
        push_single(entries, "requires_python", &self.requires_python);
        entries.push(("requires_external", self.requires_external.clone()));
        entries.push(("project_url", self.project_url.clone()));
    }
}

/// Typed metadata of a distribution, shaped by its declared metadata version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageMetadata {
    V1_0(Metadata10),
    V1_1(Metadata11),
    V1_2(Metadata12),
}

impl PackageMetadata {
    pub fn metadata_version(&self) -> MetadataVersion {
        match self {
            PackageMetadata::V1_0(_) => MetadataVersion::V1_0,
            PackageMetadata::V1_1(_) => MetadataVersion::V1_1,
            PackageMetadata::V1_2(_) => MetadataVersion::V1_2,
        }
    }

    fn base(&self) -> &Metadata10 {
        match self {
            PackageMetadata::V1_0(meta) => meta,
            PackageMetadata::V1_1(meta) => &meta.base,
            PackageMetadata::V1_2(meta) => &meta.base.base,
        }
    }

    fn v1_1(&self) -> Option<&Metadata11> {
        match self {
            PackageMetadata::V1_0(_) => None,
            PackageMetadata::V1_1(meta) => Some(meta),
            PackageMetadata::V1_2(meta) => Some(&meta.base),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PackageMetadata::V1_0(meta) => meta.validate(),
            PackageMetadata::V1_1(meta) => meta.validate(),
            PackageMetadata::V1_2(meta) => meta.validate(),
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn version(&self) -> &str {
        &self.base().version
    }

    pub fn summary(&self) -> Option<&str> {
        self.base().summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.base().description.as_deref()
    }

    pub fn home_page(&self) -> Option<&str> {
        self.base().home_page.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.base().author.as_deref()
    }

    pub fn author_email(&self) -> Option<&str> {
        self.base().author_email.as_deref()
    }

    /// Returns the declared license, or [`UNKNOWN_LICENSE`] when none was declared.
    pub fn license(&self) -> &str {
        self.base().license.as_deref().unwrap_or(UNKNOWN_LICENSE)
    }

    pub fn download_url(&self) -> Option<&str> {
        self.v1_1().and_then(|meta| meta.download_url.as_deref())
    }

    pub fn classifiers(&self) -> &[String] {
        self.v1_1()
            .map(|meta| meta.classifiers.as_slice())
            .unwrap_or_default()
    }

    pub fn requires_python(&self) -> Option<&str> {
        match self {
            PackageMetadata::V1_2(meta) => meta.requires_python.as_deref(),
            _ => None,
        }
    }

    /// Lists every field of this metadata version with its values, in declaration order.
    pub fn entries(&self) -> Vec<(&'static str, Vec<String>)> {
        let mut entries = Vec::new();
        match self {
            PackageMetadata::V1_0(meta) => meta.entries(&mut entries),
            PackageMetadata::V1_1(meta) => meta.entries(&mut entries),
            PackageMetadata::V1_2(meta) => meta.entries(&mut entries),
        }
        entries
    }
}

/// Maps metadata versions to their legal field sets and projects descriptors onto them.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    fields: BTreeMap<MetadataVersion, Vec<String>>,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        let fields = MetadataVersion::ALL
            .into_iter()
            .map(|version| {
                let fields = version
                    .known_fields()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (version, fields)
            })
            .collect();
        Self { fields }
    }
}

impl MetadataResolver {
    /// Creates a resolver, optionally restricting the field sets of some versions.
    ///
    /// # Errors
    ///
    /// * [`PackageError::UnsupportedMetadataVersion`] if an override names an unknown version.
    /// * [`PackageError::UnknownField`] if an override names a field its version does not
    ///   define.
    pub fn new(overrides: Option<&BTreeMap<String, Vec<String>>>) -> Result<Self> {
        let mut resolver = Self::default();

        for (version, fields) in overrides.into_iter().flatten() {
            let version: MetadataVersion = version.parse()?;
            let known = version.known_fields();

            let mut restricted = Vec::with_capacity(fields.len());
            for field in fields {
                let field = field.trim().to_ascii_lowercase().replace('-', "_");
                if !known.iter().any(|known| *known == field) {
                    return Err(PackageError::UnknownField {
                        version: version.to_string(),
                        field,
                    });
                }
                if !restricted.contains(&field) {
                    restricted.push(field);
                }
            }

            resolver.fields.insert(version, restricted);
        }

        Ok(resolver)
    }

    /// Returns the legal field set of `version`.
    pub fn fields(&self, version: MetadataVersion) -> &[String] {
        self.fields
            .get(&version)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Projects a descriptor onto the typed form of its declared metadata version.
    ///
    /// Declared fields outside the version's field set are dropped.
    ///
    /// # Errors
    ///
    /// * [`PackageError::UnsupportedMetadataVersion`] for unknown metadata versions.
    /// * [`PackageError::InvalidMetadata`] if the projected metadata fails validation.
    pub fn resolve(&self, descriptor: &Descriptor) -> Result<PackageMetadata> {
        let version: MetadataVersion = descriptor.metadata_version().parse()?;
        let allowed = self.fields(version);

        for (field, _) in descriptor.fields() {
            let structural = matches!(field, "name" | "version" | "metadata_version");
            if !structural && !allowed.iter().any(|allowed| allowed == field) {
                debug!(
                    field,
                    metadata_version = version.as_str(),
                    "dropping field not defined by metadata version"
                );
            }
        }

        let projection = Projection {
            descriptor,
            allowed,
        };
        let metadata = match version {
            MetadataVersion::V1_0 => PackageMetadata::V1_0(Metadata10::project(&projection)),
            MetadataVersion::V1_1 => PackageMetadata::V1_1(Metadata11::project(&projection)),
            MetadataVersion::V1_2 => PackageMetadata::V1_2(Metadata12::project(&projection)),
        };
        metadata.validate()?;

        Ok(metadata)
    }

    /// Builds the metadata blob stored on a release.
    ///
    /// Every field of the version's field set is present as an array of strings, empty when
    /// the distribution did not declare it.
    pub fn package_info(&self, metadata: &PackageMetadata) -> Value {
        let allowed = self.fields(metadata.metadata_version());
        let map: Map<String, Value> = metadata
            .entries()
            .into_iter()
            .filter(|(field, _)| allowed.iter().any(|allowed| allowed == field))
            .map(|(field, values)| {
                let values = values.into_iter().map(Value::String).collect();
                (field.to_string(), Value::Array(values))
            })
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(metadata_version: &str, extra: &[(&str, &str)]) -> Descriptor {
        let mut fields = vec![
            ("metadata_version", metadata_version),
            ("name", "demo"),
            ("version", "1.0"),
        ];
        fields.extend_from_slice(extra);
        Descriptor::from_form(fields)
    }

    #[test]
    fn test_field_sets_are_cumulative() {
        let v10 = MetadataVersion::V1_0.known_fields();
        let v11 = MetadataVersion::V1_1.known_fields();
        let v12 = MetadataVersion::V1_2.known_fields();

        assert!(v10.iter().all(|field| v11.contains(field)));
        assert!(v11.iter().all(|field| v12.contains(field)));
        assert!(v11.contains(&"classifiers"));
        assert!(!v10.contains(&"classifiers"));
        assert!(v12.contains(&"requires_python"));
        assert!(!v11.contains(&"requires_python"));
    }

    #[test]
    fn test_multi_valued_fields_are_known() {
        let v12 = MetadataVersion::V1_2.known_fields();
        assert!(MULTI_VALUED_FIELDS.iter().all(|field| v12.contains(field)));
        assert!(is_multi_valued("classifiers"));
        assert!(!is_multi_valued("summary"));
    }

    #[test]
    fn test_parse_metadata_version() {
        assert_eq!("1.1".parse::<MetadataVersion>().unwrap(), MetadataVersion::V1_1);
        assert!(matches!(
            "9.9".parse::<MetadataVersion>(),
            Err(PackageError::UnsupportedMetadataVersion(v)) if v == "9.9"
        ));
    }

    #[test]
    fn test_resolve_drops_fields_of_later_versions() {
        let resolver = MetadataResolver::default();
        let extra = [("requires_python", ">=3.8"), ("classifiers", "Topic :: Utilities")];

        let v10 = resolver.resolve(&descriptor("1.0", &extra)).unwrap();
        assert_eq!(v10.requires_python(), None);
        assert!(v10.classifiers().is_empty());
        let info = resolver.package_info(&v10);
        assert!(info.get("requires_python").is_none());
        assert!(info.get("classifiers").is_none());

        let v12 = resolver.resolve(&descriptor("1.2", &extra)).unwrap();
        assert_eq!(v12.requires_python(), Some(">=3.8"));
        assert_eq!(v12.classifiers(), ["Topic :: Utilities"]);
        let info = resolver.package_info(&v12);
        assert_eq!(info["requires_python"], serde_json::json!([">=3.8"]));
    }

    #[test]
    fn test_resolve_rejects_unknown_version() {
        let resolver = MetadataResolver::default();
        let result = resolver.resolve(&descriptor("9.9", &[]));
        assert!(matches!(
            result,
            Err(PackageError::UnsupportedMetadataVersion(_))
        ));
    }

    #[test]
    fn test_license_defaults_to_unknown() {
        let resolver = MetadataResolver::default();
        let metadata = resolver.resolve(&descriptor("1.0", &[("license", "")])).unwrap();

        assert_eq!(metadata.license(), UNKNOWN_LICENSE);
        let info = resolver.package_info(&metadata);
        assert_eq!(info["license"], serde_json::json!(["Unknown"]));
        assert_eq!(info["summary"], serde_json::json!([]));
    }

    #[test]
    fn test_validate_rejects_bad_name_and_version() {
        let resolver = MetadataResolver::default();

        let bad_name = Descriptor::from_form([("name", "-demo-"), ("version", "1.0")]);
        assert!(matches!(
            resolver.resolve(&bad_name),
            Err(PackageError::InvalidMetadata { field, .. }) if field == "name"
        ));

        let bad_version = Descriptor::from_form([("name", "demo"), ("version", "1.0 beta")]);
        assert!(matches!(
            resolver.resolve(&bad_version),
            Err(PackageError::InvalidMetadata { field, .. }) if field == "version"
        ));

        let no_version = Descriptor::from_form([("name", "demo")]);
        assert!(resolver.resolve(&no_version).is_err());
    }

    #[test]
    fn test_validate_project_url() {
        let resolver = MetadataResolver::default();

        let good = descriptor("1.2", &[("project_url", "Docs, https://example.com/docs")]);
        assert!(resolver.resolve(&good).is_ok());

        let bad = descriptor("1.2", &[("project_url", "https://example.com/docs")]);
        assert!(matches!(
            resolver.resolve(&bad),
            Err(PackageError::InvalidMetadata { field, .. }) if field == "project_url"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_entries() {
        let metadata = Metadata11 {
            base: Metadata10 {
                name: "demo".into(),
                version: "1.0".into(),
                ..Default::default()
            },
            classifiers: vec![" ".into()],
            ..Default::default()
        };
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn test_overrides_restrict_field_set() {
        let overrides = BTreeMap::from([(
            "1.1".to_string(),
            vec!["summary".to_string(), "Classifiers".to_string()],
        )]);
        let resolver = MetadataResolver::new(Some(&overrides)).unwrap();

        assert_eq!(resolver.fields(MetadataVersion::V1_1), ["summary", "classifiers"]);
        assert_eq!(
            resolver.fields(MetadataVersion::V1_0).len(),
            FIELDS_1_0.len()
        );

        let metadata = resolver
            .resolve(&descriptor(
                "1.1",
                &[("summary", "short"), ("author", "Alice"), ("classifiers", "A :: B")],
            ))
            .unwrap();
        assert_eq!(metadata.author(), None);
        assert_eq!(metadata.summary(), Some("short"));

        let info = resolver.package_info(&metadata);
        let keys: Vec<_> = info.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_overrides_reject_unknown_fields() {
        let overrides = BTreeMap::from([(
            "1.0".to_string(),
            vec!["requires_python".to_string()],
        )]);
        assert!(matches!(
            MetadataResolver::new(Some(&overrides)),
            Err(PackageError::UnknownField { .. })
        ));

        let overrides = BTreeMap::from([("2.0".to_string(), vec![])]);
        assert!(matches!(
            MetadataResolver::new(Some(&overrides)),
            Err(PackageError::UnsupportedMetadataVersion(_))
        ));
    }
}
