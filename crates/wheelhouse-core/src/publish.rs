//! The publish operation.
//!
//! Publishing validates a distribution, resolves the package owner, records the package,
//! release and distribution rows, and moves the artifact into storage. Everything from the
//! first registry read to the artifact move happens inside one immediate transaction, and the
//! artifact placement is only kept once that transaction commits.

use std::path::{Path, PathBuf};

use diesel::SqliteConnection;
use serde_json::Value;
use tracing::{debug, info};
use wheelhouse_config::config::Config;
use wheelhouse_db::{
    models::registry::{NewDistribution, NewPackage, NewRelease, PackageAttributes},
    repository::{
        classifier::ClassifierRepository, distribution::DistributionRepository,
        package::PackageRepository, release::ReleaseRepository, user::UserRepository,
    },
};
use wheelhouse_package::{
    read_descriptor, Descriptor, FileType, MetadataResolver, PackageError, PackageMetadata,
};

use crate::{
    constants::DEFAULT_PYVERSION,
    database::connection::RegistryDatabase,
    error::{RegistryError, Result},
    ownership::{OwnershipRequest, OwnershipResolver},
    storage::{ArtifactStore, Placement, StagedArtifact},
};

/// A distribution file submitted for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Local file holding the artifact bytes.
    pub path: PathBuf,
    /// Client-facing file name the artifact is stored under.
    pub filename: String,
}

impl Artifact {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, filename: S) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
        }
    }

    /// Uses the file name of `path` as the artifact name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(path, filename)
    }
}

/// Everything a client supplies when publishing.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Metadata declared alongside the upload. When absent it is read from the artifact.
    pub descriptor: Option<Descriptor>,
    /// The distribution file; registrations without a file only record the release.
    pub artifact: Option<Artifact>,
    /// Owner forced by the operator, as a username or email.
    pub owner: Option<String>,
    /// Id of the authenticated user performing the upload.
    pub uploader: Option<i32>,
    pub md5_digest: Option<String>,
    pub filetype: Option<String>,
    pub pyversion: Option<String>,
    pub comment: Option<String>,
    pub signature: Option<String>,
}

impl PublishRequest {
    /// A request publishing the archive at `path`, reading its metadata from the archive.
    pub fn from_file<P: AsRef<Path>>(path: P, owner: Option<&str>) -> Self {
        Self {
            artifact: Some(Artifact::from_path(path)),
            owner: owner.map(str::to_string),
            ..Default::default()
        }
    }
}

/// Registry-wide publishing policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishPolicy {
    /// Republishing an existing version replaces its metadata and files.
    pub allow_version_overwrite: bool,
    /// Any authenticated uploader may own new packages.
    pub global_ownership: bool,
}

impl PublishPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allow_version_overwrite: config.allow_version_overwrite(),
            global_ownership: config.global_ownership(),
        }
    }
}

/// A distribution recorded by a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile {
    pub filename: String,
    pub content: String,
    pub md5_digest: String,
    pub size: u64,
    pub filetype: FileType,
    pub pyversion: String,
    /// Whether an existing distribution with the same file name was replaced.
    pub replaced: bool,
}

/// A release accepted by a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRelease {
    pub name: String,
    pub version: String,
    pub release_id: i32,
    pub owner_id: i32,
    pub package_created: bool,
    pub release_created: bool,
    pub file: Option<PublishedFile>,
}

/// The result of a publish that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(PublishedRelease),
    /// The release, or the same file of it, was already published and overwriting is disabled.
    AlreadyPublished { name: String, version: String },
}

impl PublishOutcome {
    pub fn name(&self) -> &str {
        match self {
            PublishOutcome::Published(release) => &release.name,
            PublishOutcome::AlreadyPublished { name, .. } => name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            PublishOutcome::Published(release) => &release.version,
            PublishOutcome::AlreadyPublished { version, .. } => version,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published(_))
    }
}

/// Request data validated before the registry is touched.
struct Prepared<'a> {
    request: &'a PublishRequest,
    metadata: PackageMetadata,
    package_info: Value,
    file: Option<PreparedFile>,
}

struct PreparedFile {
    staged: StagedArtifact,
    filename: String,
    content: String,
    filetype: FileType,
    pyversion: String,
}

/// Publishes distributions into the registry.
#[derive(Clone)]
pub struct Publisher {
    db: RegistryDatabase,
    store: ArtifactStore,
    resolver: MetadataResolver,
    policy: PublishPolicy,
}

impl Publisher {
    pub fn new(
        db: RegistryDatabase,
        store: ArtifactStore,
        resolver: MetadataResolver,
        policy: PublishPolicy,
    ) -> Self {
        Self {
            db,
            store,
            resolver,
            policy,
        }
    }

    pub fn db(&self) -> &RegistryDatabase {
        &self.db
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    pub fn policy(&self) -> PublishPolicy {
        self.policy
    }

    /// Publishes a distribution.
    ///
    /// Either the whole publish is recorded, artifact included, or nothing changes.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::Package`] if the metadata is unreadable, of an unsupported version
    ///   or invalid.
    /// * [`RegistryError::ChecksumMismatch`] if a declared MD5 digest does not match.
    /// * [`RegistryError::InvalidFilename`] or [`RegistryError::FilenameConflict`] for file
    ///   names that cannot be stored.
    /// * [`RegistryError::OwnerNotFound`], [`RegistryError::NoOwnerResolved`] or
    ///   [`RegistryError::NotOwner`] if ownership rules reject the publish.
    /// * Database and storage errors.
    pub fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let prepared = self.prepare(request)?;
        let name = prepared.metadata.name().to_string();
        let version = prepared.metadata.version().to_string();

        let mut placement: Option<Placement> = None;
        let outcome = self
            .db
            .immediate_transaction(|conn| self.record(conn, prepared, &mut placement))?;

        if let Some(placement) = placement {
            placement.commit();
        }

        match &outcome {
            PublishOutcome::Published(release) => {
                info!(
                    name = name.as_str(),
                    version = version.as_str(),
                    file = release.file.as_ref().map(|file| file.filename.as_str()),
                    "{name}-{version} added"
                );
            }
            PublishOutcome::AlreadyPublished { .. } => {
                info!(
                    name = name.as_str(),
                    version = version.as_str(),
                    "{name}-{version} already added"
                );
            }
        }

        Ok(outcome)
    }

    /// Validates the request, stages its artifact and resolves its metadata.
    fn prepare<'a>(&self, request: &'a PublishRequest) -> Result<Prepared<'a>> {
        let staged = match &request.artifact {
            Some(artifact) => {
                let content = self.store.content_path(&artifact.filename)?;
                let staged = self.store.stage_file(&artifact.path)?;
                Some((artifact, content, staged))
            }
            None => None,
        };

        if let (Some((artifact, _, staged)), Some(expected)) = (
            &staged,
            request.md5_digest.as_deref().map(str::trim).filter(|d| !d.is_empty()),
        ) {
            if !staged.md5_digest().eq_ignore_ascii_case(expected) {
                return Err(RegistryError::ChecksumMismatch {
                    filename: artifact.filename.clone(),
                    expected: expected.to_string(),
                    actual: staged.md5_digest().to_string(),
                });
            }
        }

        let descriptor = match (&request.descriptor, &staged) {
            (Some(descriptor), _) => descriptor.clone(),
            (None, Some((artifact, _, staged))) => {
                read_descriptor(staged.path(), &artifact.filename)?
            }
            (None, None) => {
                return Err(PackageError::MetadataUnreadable {
                    source_name: "request".to_string(),
                    reason: "neither metadata nor a distribution file was supplied".to_string(),
                }
                .into());
            }
        };

        let metadata = self.resolver.resolve(&descriptor)?;
        let package_info = self.resolver.package_info(&metadata);

        let file = match staged {
            Some((artifact, content, staged)) => {
                let filetype = match non_blank(request.filetype.as_deref()) {
                    Some(declared) => declared.parse()?,
                    None => FileType::from_filename(&artifact.filename),
                };
                let pyversion = non_blank(request.pyversion.as_deref())
                    .or(metadata.requires_python())
                    .unwrap_or(DEFAULT_PYVERSION)
                    .to_string();

                Some(PreparedFile {
                    staged,
                    filename: artifact.filename.clone(),
                    content,
                    filetype,
                    pyversion,
                })
            }
            None => None,
        };

        Ok(Prepared {
            request,
            metadata,
            package_info,
            file,
        })
    }

    /// Records a prepared publish. Runs inside the publish transaction.
    fn record(
        &self,
        conn: &mut SqliteConnection,
        prepared: Prepared,
        placement: &mut Option<Placement>,
    ) -> Result<PublishOutcome> {
        let Prepared {
            request,
            metadata,
            package_info,
            file,
        } = prepared;
        let name = metadata.name();
        let version = metadata.version();

        let package = PackageRepository::find_by_name(conn, name)?;
        let release = match &package {
            Some(package) => ReleaseRepository::find(conn, package.id, version)?,
            None => None,
        };

        if let Some(release) = &release {
            if !self.policy.allow_version_overwrite {
                let duplicate = match &file {
                    Some(file) => {
                        DistributionRepository::find_by_content(conn, &file.content)?
                            .is_some_and(|existing| existing.release_id == release.id)
                    }
                    None => true,
                };
                if duplicate {
                    return Ok(PublishOutcome::AlreadyPublished {
                        name: name.to_string(),
                        version: version.to_string(),
                    });
                }
            }
        }

        let existing_owner = package.as_ref().and_then(|package| package.owner_id);
        let resolved = OwnershipResolver::new(self.policy.global_ownership).resolve(
            conn,
            &OwnershipRequest {
                package: name,
                explicit: request.owner.as_deref(),
                author_email: metadata.author_email(),
                existing_owner,
                uploader: request.uploader,
            },
        )?;
        let owner_id = existing_owner.unwrap_or(resolved.user_id);

        if let Some(uploader) = request.uploader {
            if uploader != owner_id && !self.policy.global_ownership {
                let user = UserRepository::find_by_id(conn, uploader)?
                    .map(|user| user.username)
                    .unwrap_or_else(|| uploader.to_string());
                return Err(RegistryError::NotOwner {
                    user,
                    package: name.to_string(),
                });
            }
        }

        let (package_id, package_created) = match &package {
            Some(package) => {
                if package.owner_id.is_none() {
                    PackageRepository::claim_owner(conn, package.id, owner_id)?;
                }
                (package.id, false)
            }
            None => {
                let id = PackageRepository::insert(
                    conn,
                    &NewPackage {
                        name,
                        owner_id: Some(owner_id),
                        license: metadata.license(),
                        metadata_version: metadata.metadata_version().as_str(),
                    },
                )?;
                debug!(name, "created package");
                (id, true)
            }
        };

        let refresh_metadata = release.is_none() || self.policy.allow_version_overwrite;
        if refresh_metadata {
            PackageRepository::update_attributes(
                conn,
                package_id,
                &PackageAttributes {
                    license: metadata.license(),
                    summary: metadata.summary(),
                    description: metadata.description(),
                    home_page: metadata.home_page(),
                    download_url: metadata.download_url(),
                    author: metadata.author(),
                    author_email: metadata.author_email(),
                    metadata_version: metadata.metadata_version().as_str(),
                },
            )?;

            for classifier in metadata.classifiers() {
                let classifier_id = ClassifierRepository::get_or_create(conn, classifier)?;
                ClassifierRepository::attach(conn, package_id, classifier_id)?;
            }
        }

        let (release_id, release_created) = match &release {
            Some(release) => {
                if self.policy.allow_version_overwrite {
                    ReleaseRepository::replace_info(
                        conn,
                        release.id,
                        metadata.metadata_version().as_str(),
                        &package_info,
                    )?;
                    debug!(name, version, "replaced release metadata");
                }
                (release.id, false)
            }
            None => {
                let id = ReleaseRepository::insert(
                    conn,
                    &NewRelease {
                        package_id,
                        version,
                        metadata_version: metadata.metadata_version().as_str(),
                        package_info,
                    },
                )?;
                (id, true)
            }
        };

        let file = match file {
            Some(file) => {
                Some(self.record_file(conn, request, release_id, owner_id, file, placement)?)
            }
            None => None,
        };

        Ok(PublishOutcome::Published(PublishedRelease {
            name: name.to_string(),
            version: version.to_string(),
            release_id,
            owner_id,
            package_created,
            release_created,
            file,
        }))
    }

    /// Records the distribution row and moves the artifact into storage.
    ///
    /// The move is the last step of the transaction so no later statement can fail after it.
    fn record_file(
        &self,
        conn: &mut SqliteConnection,
        request: &PublishRequest,
        release_id: i32,
        owner_id: i32,
        file: PreparedFile,
        placement: &mut Option<Placement>,
    ) -> Result<PublishedFile> {
        let existing = DistributionRepository::find_by_content(conn, &file.content)?;
        if let Some(existing) = &existing {
            if existing.release_id != release_id {
                let owner = match ReleaseRepository::find_by_id(conn, existing.release_id)? {
                    Some(release) => {
                        let package = PackageRepository::find_by_id(conn, release.package_id)?
                            .map(|package| package.name)
                            .unwrap_or_default();
                        format!("{package}-{}", release.version)
                    }
                    None => format!("release #{}", existing.release_id),
                };
                return Err(RegistryError::FilenameConflict {
                    filename: file.filename,
                    owner,
                });
            }
        }

        let md5_digest = file.staged.md5_digest().to_string();
        let size = file.staged.size();
        let row = NewDistribution {
            release_id,
            content: &file.content,
            filename: &file.filename,
            md5_digest: &md5_digest,
            size: size as i64,
            filetype: file.filetype.as_str(),
            pyversion: &file.pyversion,
            uploader_id: Some(request.uploader.unwrap_or(owner_id)),
            comment: non_blank(request.comment.as_deref()),
            signature: non_blank(request.signature.as_deref()),
        };

        let replaced = match &existing {
            Some(existing) => {
                DistributionRepository::replace(conn, existing.id, &row)?;
                true
            }
            None => {
                DistributionRepository::insert(conn, &row)?;
                false
            }
        };

        *placement = Some(self.store.place(file.staged, &file.filename)?);

        Ok(PublishedFile {
            filename: file.filename,
            content: file.content,
            md5_digest,
            size,
            filetype: file.filetype,
            pyversion: file.pyversion,
            replaced,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
