use std::sync::Arc;

use tracing::debug;
use wheelhouse_config::config::Config;
use wheelhouse_core::{
    database::connection::RegistryDatabase,
    error::RegistryError,
    publish::{PublishPolicy, Publisher},
    storage::ArtifactStore,
};
use wheelhouse_package::MetadataResolver;
use wheelhouse_utils::fs::ensure_dir_exists;

use crate::{error::Result, routes::Routes};

/// Shared state for registry operations.
///
/// Built once from an immutable configuration; clones share the database connection.
#[derive(Clone)]
pub struct RegistryContext {
    config: Arc<Config>,
    publisher: Publisher,
    routes: Arc<Routes>,
}

impl RegistryContext {
    /// Opens the registry described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the database or storage cannot be opened, if the metadata field overrides
    /// name unknown fields, or if a handler table names an unknown handler.
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.get_db_path()?;
        let storage_path = config.get_storage_path()?;
        debug!(
            db = %db_path.display(),
            storage = %storage_path.display(),
            "opening registry"
        );

        if let Some(parent) = db_path.parent() {
            ensure_dir_exists(parent).map_err(RegistryError::from)?;
        }
        let db = RegistryDatabase::open(&db_path)?;
        let store = ArtifactStore::new(storage_path, config.upload_to())?;
        let resolver = MetadataResolver::new(config.metadata_fields.as_ref())?;
        let routes = Routes::from_config(&config)?;
        let publisher = Publisher::new(db, store, resolver, PublishPolicy::from_config(&config));

        Ok(Self {
            config: Arc::new(config),
            publisher,
            routes: Arc::new(routes),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn db(&self) -> &RegistryDatabase {
        self.publisher.db()
    }

    pub fn store(&self) -> &ArtifactStore {
        self.publisher.store()
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Public URL of a stored artifact.
    pub fn media_url(&self, content: &str) -> String {
        let prefix = self.config.media_url();
        if prefix.ends_with('/') {
            format!("{prefix}{content}")
        } else {
            format!("{prefix}/{content}")
        }
    }
}
