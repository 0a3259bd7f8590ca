use std::{fs, path::PathBuf};

use flate2::{write::GzEncoder, Compression};
use tempfile::{tempdir, TempDir};
use wheelhouse_config::config::Config;
use wheelhouse_core::publish::{PublishOutcome, PublishRequest};
use wheelhouse_db::models::registry::User;

use crate::{context::RegistryContext, users::add_user};

/// A registry living in a temporary directory.
pub struct TestRegistry {
    dir: TempDir,
    context: RegistryContext,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().display().to_string();

        let mut config = Config::default_config();
        config.root_path = Some(root.clone());
        config.db_path = Some(format!("{root}/registry.db"));
        config.storage_path = Some(format!("{root}/media"));
        configure(&mut config);
        config.resolve().unwrap();

        let context = RegistryContext::new(config).unwrap();
        Self { dir, context }
    }

    pub fn context(&self) -> &RegistryContext {
        &self.context
    }

    /// Creates a user without a password.
    pub fn user(&self, username: &str, email: &str) -> User {
        add_user(&self.context, username, email, None).unwrap()
    }

    pub fn user_with_password(&self, username: &str, email: &str, password: &str) -> User {
        add_user(&self.context, username, email, Some(password)).unwrap()
    }

    /// Writes a gzipped source distribution holding `pkg_info` outside the registry storage.
    pub fn sdist(&self, filename: &str, pkg_info: &str) -> PathBuf {
        let incoming = self.dir.path().join("incoming");
        fs::create_dir_all(&incoming).unwrap();
        let path = incoming.join(filename);

        let encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(pkg_info.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "pkg/PKG-INFO", pkg_info.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    /// Publishes an sdist built from `pkg_info`, with ownership taken from its author email.
    pub fn publish_sdist(&self, filename: &str, pkg_info: &str) -> PublishOutcome {
        let path = self.sdist(filename, pkg_info);
        self.context
            .publisher()
            .publish(&PublishRequest::from_file(&path, None))
            .unwrap()
    }
}

/// Renders a PKG-INFO document.
pub fn pkg_info(metadata_version: &str, name: &str, version: &str, extra: &[(&str, &str)]) -> String {
    let mut content =
        format!("Metadata-Version: {metadata_version}\nName: {name}\nVersion: {version}\n");
    for (key, value) in extra {
        content.push_str(&format!("{key}: {value}\n"));
    }
    content
}
