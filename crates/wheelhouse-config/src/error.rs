use miette::Diagnostic;
use thiserror::Error;
use wheelhouse_utils::error::{FileSystemError, PathError, UtilsError};

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(wheelhouse_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(wheelhouse_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(wheelhouse_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Invalid upload path: {0}")]
    #[diagnostic(
        code(wheelhouse_config::invalid_upload_path),
        help("`upload_to` must be a relative path below the storage root without `..`")
    )]
    InvalidUploadPath(String),

    #[error("Invalid listen address: {0}")]
    #[diagnostic(
        code(wheelhouse_config::invalid_listen),
        help("Use a socket address such as `127.0.0.1:8000`")
    )]
    InvalidListenAddress(String),

    #[error("Invalid proxy base URL: {0}")]
    #[diagnostic(
        code(wheelhouse_config::invalid_proxy_url),
        help("The proxy base URL must start with http:// or https://")
    )]
    InvalidProxyUrl(String),

    #[error("Empty name in `{0}` table")]
    #[diagnostic(
        code(wheelhouse_config::empty_route),
        help("Every action and RPC method needs a non-empty name and handler")
    )]
    EmptyRouteName(&'static str),

    #[error("IO error: {0}")]
    #[diagnostic(code(wheelhouse_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(wheelhouse_config::utils))]
    Utils(#[from] UtilsError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(wheelhouse_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(wheelhouse_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
