use std::{
    collections::BTreeMap,
    fs,
    net::SocketAddr,
    path::{Component, Path, PathBuf},
    sync::{LazyLock, RwLock},
};

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::info;
use wheelhouse_utils::path::{resolve_path, xdg_config_home, xdg_data_home};

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

pub const DEFAULT_UPLOAD_TO: &str = "dists";
pub const DEFAULT_MEDIA_URL: &str = "/media/";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub const DEFAULT_PROXY_BASE_URL: &str = "https://pypi.org/simple";
pub const DEFAULT_FALLBACK: &str = "index";
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// Registry configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Root directory holding the registry database and stored artifacts.
    /// Default: $WHEELHOUSE_ROOT or $XDG_DATA_HOME/wheelhouse
    pub root_path: Option<String>,

    /// Path of the SQLite registry database.
    /// Default: $WHEELHOUSE_ROOT/registry.db
    pub db_path: Option<String>,

    /// Directory that uploaded artifacts are stored under.
    /// Default: $WHEELHOUSE_ROOT/media
    pub storage_path: Option<String>,

    /// Sub-path of the storage directory receiving distribution files.
    /// Default: dists
    pub upload_to: Option<String>,

    /// URL prefix under which stored artifacts are served.
    /// Default: /media/
    pub media_url: Option<String>,

    /// Socket address the server listens on.
    /// Default: 127.0.0.1:8000
    pub listen: Option<String>,

    /// Whether republishing an existing version replaces it.
    /// Default: false
    pub allow_version_overwrite: Option<bool>,

    /// Whether any authenticated uploader may own and publish to any package.
    /// Default: false
    pub global_ownership: Option<bool>,

    /// Upstream simple index used by `add` and by the missing package redirect.
    /// Default: https://pypi.org/simple
    pub proxy_base_url: Option<String>,

    /// Redirect simple index requests for unknown packages to the upstream index.
    /// Default: false
    pub proxy_missing: Option<bool>,

    /// Largest accepted upload body, in bytes.
    /// Default: 536870912
    pub max_upload_size: Option<u64>,

    /// Handler used when a request carries no `:action`.
    /// Default: index
    pub fallback: Option<String>,

    /// Restricts the fields stored per metadata version, e.g. `"1.0" = ["summary", "license"]`.
    /// Versions left out keep every field they define.
    pub metadata_fields: Option<BTreeMap<String, Vec<String>>>,

    /// Maps `:action` values of the upload protocol to handler names.
    pub actions: Option<BTreeMap<String, String>>,

    /// Maps XML-RPC method names to handler names.
    pub rpc_methods: Option<BTreeMap<String, String>>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("WHEELHOUSE_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("wheelhouse").join("config.toml"),
    })
});

pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global_config = CONFIG.write().unwrap();
    *global_config = Some(config);
    Ok(())
}

pub fn get_config() -> Config {
    {
        let config_guard = CONFIG.read().unwrap();
        if let Some(config) = config_guard.as_ref() {
            return config.clone();
        }
    }

    let mut config_guard = CONFIG.write().unwrap();
    config_guard.get_or_insert_with(Config::default_config).clone()
}

pub fn default_actions() -> BTreeMap<String, String> {
    [
        ("file_upload", "publish"),
        ("submit", "publish"),
        ("list_classifiers", "list_classifiers"),
    ]
    .into_iter()
    .map(|(action, handler)| (action.to_string(), handler.to_string()))
    .collect()
}

pub fn default_rpc_methods() -> BTreeMap<String, String> {
    [
        "list_packages",
        "package_releases",
        "release_urls",
        "release_data",
    ]
    .into_iter()
    .map(|method| (method.to_string(), method.to_string()))
    .collect()
}

fn default_root() -> String {
    std::env::var("WHEELHOUSE_ROOT")
        .unwrap_or_else(|_| format!("{}/wheelhouse", xdg_data_home().display()))
}

impl Config {
    pub fn default_config() -> Self {
        let root = default_root();

        Self {
            db_path: Some(format!("{root}/registry.db")),
            storage_path: Some(format!("{root}/media")),
            root_path: Some(root),
            upload_to: Some(DEFAULT_UPLOAD_TO.to_string()),
            media_url: Some(DEFAULT_MEDIA_URL.to_string()),
            listen: Some(DEFAULT_LISTEN.to_string()),
            allow_version_overwrite: Some(false),
            global_ownership: Some(false),
            proxy_base_url: Some(DEFAULT_PROXY_BASE_URL.to_string()),
            proxy_missing: Some(false),
            max_upload_size: Some(DEFAULT_MAX_UPLOAD_SIZE),
            fallback: Some(DEFAULT_FALLBACK.to_string()),
            metadata_fields: None,
            actions: Some(default_actions()),
            rpc_methods: Some(default_rpc_methods()),
        }
    }

    /// Creates a new configuration by loading it from the configuration file.
    /// If the configuration file is not found, it uses the default configuration.
    pub fn new() -> Result<Self> {
        let config_path = CONFIG_PATH.read().unwrap().to_path_buf();
        Self::load(&config_path)
    }

    pub fn load(config_path: &Path) -> Result<Self> {
        let mut config = match fs::read_to_string(config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        self.upload_to
            .get_or_insert_with(|| DEFAULT_UPLOAD_TO.to_string());
        self.media_url
            .get_or_insert_with(|| DEFAULT_MEDIA_URL.to_string());
        self.listen.get_or_insert_with(|| DEFAULT_LISTEN.to_string());
        self.proxy_base_url
            .get_or_insert_with(|| DEFAULT_PROXY_BASE_URL.to_string());
        self.fallback
            .get_or_insert_with(|| DEFAULT_FALLBACK.to_string());
        self.allow_version_overwrite.get_or_insert(false);
        self.global_ownership.get_or_insert(false);
        self.proxy_missing.get_or_insert(false);
        self.max_upload_size.get_or_insert(DEFAULT_MAX_UPLOAD_SIZE);

        // Explicit tables extend the defaults so a config naming one extra action keeps the rest.
        let mut actions = default_actions();
        actions.extend(self.actions.take().unwrap_or_default());
        self.actions = Some(actions);

        let mut rpc_methods = default_rpc_methods();
        rpc_methods.extend(self.rpc_methods.take().unwrap_or_default());
        self.rpc_methods = Some(rpc_methods);

        let upload_to = self.upload_to();
        let upload_path = Path::new(upload_to);
        let is_relative_subpath = !upload_to.is_empty()
            && upload_path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_relative_subpath {
            return Err(ConfigError::InvalidUploadPath(upload_to.to_string()));
        }

        if self.listen().parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddress(self.listen().to_string()));
        }

        let proxy = self.proxy_base_url();
        if !(proxy.starts_with("http://") || proxy.starts_with("https://")) {
            return Err(ConfigError::InvalidProxyUrl(proxy.to_string()));
        }

        for (table, routes) in [("actions", &self.actions), ("rpc_methods", &self.rpc_methods)] {
            let has_empty = routes.iter().flatten().any(|(name, handler)| {
                name.trim().is_empty() || handler.trim().is_empty()
            });
            if has_empty {
                return Err(ConfigError::EmptyRouteName(table));
            }
        }

        Ok(())
    }

    pub fn get_root_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("WHEELHOUSE_ROOT") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.root_path {
            Some(root) => Ok(resolve_path(root)?),
            None => Ok(resolve_path(&default_root())?),
        }
    }

    pub fn get_db_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("WHEELHOUSE_DB") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(db_path) = &self.db_path {
            return Ok(resolve_path(db_path)?);
        }
        Ok(self.get_root_path()?.join("registry.db"))
    }

    pub fn get_storage_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("WHEELHOUSE_STORAGE") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(storage_path) = &self.storage_path {
            return Ok(resolve_path(storage_path)?);
        }
        Ok(self.get_root_path()?.join("media"))
    }

    pub fn upload_to(&self) -> &str {
        self.upload_to.as_deref().unwrap_or(DEFAULT_UPLOAD_TO)
    }

    pub fn media_url(&self) -> &str {
        self.media_url.as_deref().unwrap_or(DEFAULT_MEDIA_URL)
    }

    pub fn listen(&self) -> &str {
        self.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
    }

    pub fn proxy_base_url(&self) -> &str {
        self.proxy_base_url
            .as_deref()
            .unwrap_or(DEFAULT_PROXY_BASE_URL)
    }

    pub fn fallback(&self) -> &str {
        self.fallback.as_deref().unwrap_or(DEFAULT_FALLBACK)
    }

    pub fn allow_version_overwrite(&self) -> bool {
        self.allow_version_overwrite.unwrap_or(false)
    }

    pub fn global_ownership(&self) -> bool {
        self.global_ownership.unwrap_or(false)
    }

    pub fn proxy_missing(&self) -> bool {
        self.proxy_missing.unwrap_or(false)
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size.unwrap_or(DEFAULT_MAX_UPLOAD_SIZE)
    }

    pub fn actions(&self) -> BTreeMap<String, String> {
        self.actions.clone().unwrap_or_else(default_actions)
    }

    pub fn rpc_methods(&self) -> BTreeMap<String, String> {
        self.rpc_methods.clone().unwrap_or_else(default_rpc_methods)
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        Ok(doc)
    }
}

pub fn generate_default_config() -> Result<()> {
    let config_path = CONFIG_PATH.read().unwrap().to_path_buf();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let def_config = Config::default_config();
    let annotated_doc = def_config.to_annotated_document()?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::{
        error::ConfigError,
        test_utils::with_env,
    };

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.upload_to(), "dists");
        assert_eq!(config.media_url(), "/media/");
        assert!(!config.allow_version_overwrite());
        assert!(!config.global_ownership());
        assert!(!config.proxy_missing());
        assert_eq!(config.fallback(), "index");
        assert_eq!(config.actions().get("submit").map(String::as_str), Some("publish"));
        assert_eq!(config.rpc_methods().len(), 4);
    }

    #[test]
    fn test_config_resolve_sets_defaults() {
        let mut config: Config = toml::from_str("").unwrap();

        config.resolve().unwrap();

        assert_eq!(config.upload_to, Some("dists".to_string()));
        assert_eq!(config.listen, Some("127.0.0.1:8000".to_string()));
        assert_eq!(config.allow_version_overwrite, Some(false));
        assert_eq!(config.max_upload_size, Some(DEFAULT_MAX_UPLOAD_SIZE));
        assert_eq!(config.actions(), default_actions());
    }

    #[test]
    fn test_config_resolve_extends_routes() {
        let mut config: Config = toml::from_str(
            r#"
            [actions]
            doc_upload = "publish"
            submit = "register"
            "#,
        )
        .unwrap();

        config.resolve().unwrap();

        let actions = config.actions();
        assert_eq!(actions.get("doc_upload").map(String::as_str), Some("publish"));
        assert_eq!(actions.get("submit").map(String::as_str), Some("register"));
        assert_eq!(actions.get("file_upload").map(String::as_str), Some("publish"));
    }

    #[test]
    fn test_config_resolve_rejects_escaping_upload_path() {
        for upload_to in ["../outside", "/abs/dists", "", "dists/../.."] {
            let mut config = Config::default_config();
            config.upload_to = Some(upload_to.to_string());
            assert!(
                matches!(config.resolve(), Err(ConfigError::InvalidUploadPath(_))),
                "{upload_to} should be rejected"
            );
        }

        let mut config = Config::default_config();
        config.upload_to = Some("dists/2024".to_string());
        assert!(config.resolve().is_ok());
    }

    #[test]
    fn test_config_resolve_rejects_bad_listen() {
        let mut config = Config::default_config();
        config.listen = Some("localhost".to_string());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidListenAddress(_))
        ));
    }

    #[test]
    fn test_config_resolve_rejects_bad_proxy() {
        let mut config = Config::default_config();
        config.proxy_base_url = Some("ftp://mirror".to_string());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidProxyUrl(_))
        ));
    }

    #[test]
    fn test_config_resolve_rejects_empty_route() {
        let mut config = Config::default_config();
        config.rpc_methods = Some(BTreeMap::from([(
            "search".to_string(),
            " ".to_string(),
        )]));
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::EmptyRouteName("rpc_methods"))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.upload_to(), config.upload_to());
        assert_eq!(deserialized.actions(), config.actions());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.upload_to(), "dists");
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "allow_version_overwrite = true\nupload_to = \"files\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.allow_version_overwrite());
        assert_eq!(config.upload_to(), "files");
        assert!(!config.global_ownership());
    }

    #[test]
    #[serial]
    fn test_db_path_env_override() {
        with_env(&[("WHEELHOUSE_DB", Some("/custom/registry.db"))], || {
            let config = Config::default_config();
            assert_eq!(
                config.get_db_path().unwrap(),
                PathBuf::from("/custom/registry.db")
            );
        });
    }

    #[test]
    #[serial]
    fn test_storage_path_env_override() {
        with_env(&[("WHEELHOUSE_STORAGE", Some("/srv/media"))], || {
            let config = Config::default_config();
            assert_eq!(
                config.get_storage_path().unwrap(),
                PathBuf::from("/srv/media")
            );
        });
    }

    #[test]
    #[serial]
    fn test_paths_fall_back_to_root() {
        let vars = [
            ("WHEELHOUSE_DB", None),
            ("WHEELHOUSE_STORAGE", None),
            ("WHEELHOUSE_ROOT", Some("/srv/wheelhouse")),
        ];
        with_env(&vars, || {
            let mut config = Config::default_config();
            config.db_path = None;
            config.storage_path = None;

            assert_eq!(
                config.get_db_path().unwrap(),
                PathBuf::from("/srv/wheelhouse/registry.db")
            );
            assert_eq!(
                config.get_storage_path().unwrap(),
                PathBuf::from("/srv/wheelhouse/media")
            );
        });
    }

    #[test]
    #[serial]
    fn test_generate_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let previous = std::mem::replace(&mut *CONFIG_PATH.write().unwrap(), path.clone());

        generate_default_config().unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let second = generate_default_config();

        *CONFIG_PATH.write().unwrap() = previous;

        assert!(written.contains("# Sub-path of the storage directory receiving distribution files."));
        assert!(matches!(second, Err(ConfigError::ConfigAlreadyExists)));
    }
}
