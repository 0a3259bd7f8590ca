use miette::Diagnostic;
use thiserror::Error;
use wheelhouse_utils::error::HashError;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(wheelhouse_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(wheelhouse_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(wheelhouse_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("I/O error: {0}")]
    #[diagnostic(code(wheelhouse_dl::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(wheelhouse_dl::hash))]
    Hash(#[from] HashError),

    #[error("Invalid package label `{0}`")]
    #[diagnostic(
        code(wheelhouse_dl::invalid_label),
        help("Use a package name, `name==version`, a URL or a local file path")
    )]
    InvalidLabel(String),

    #[error("No distribution of `{name}` matches")]
    #[diagnostic(
        code(wheelhouse_dl::no_match),
        help("Available files:\n{}", .available.join("\n"))
    )]
    NoMatch {
        name: String,
        available: Vec<String>,
    },

    #[error("Invalid response from server")]
    #[diagnostic(code(wheelhouse_dl::invalid_response))]
    InvalidResponse,

    #[error("File name could not be determined")]
    #[diagnostic(
        code(wheelhouse_dl::no_filename),
        help("Point the label at a file, not a directory")
    )]
    NoFilename,
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(status) => {
                Self::HttpError {
                    status,
                    url: String::new(),
                }
            }
            e => Self::Network(Box::new(e)),
        }
    }
}

impl DownloadError {
    /// Whether the upstream reported that the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            DownloadError::HttpError { status, .. } => *status == 404 || *status == 410,
            DownloadError::NoMatch { .. } => true,
            DownloadError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_invalid_url() {
        let err = DownloadError::InvalidUrl {
            url: "invalid".to_string(),
            source: url::ParseError::RelativeUrlWithoutBase,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid URL"));
        assert!(msg.contains("invalid"));
    }

    #[test]
    fn test_download_error_http_error() {
        let err = DownloadError::HttpError {
            status: 404,
            url: "https://pypi.org/simple/missing/".to_string(),
        };
        assert_eq!(format!("{}", err), "HTTP 404: https://pypi.org/simple/missing/");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_download_error_no_match() {
        let err = DownloadError::NoMatch {
            name: "demo".to_string(),
            available: vec!["demo-1.0.exe".to_string()],
        };
        assert_eq!(format!("{}", err), "No distribution of `demo` matches");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_ureq_error() {
        let err: DownloadError = ureq::Error::ConnectionFailed.into();
        assert!(matches!(err, DownloadError::Network(_)));
        assert!(!err.is_not_found());

        let err: DownloadError = ureq::Error::StatusCode(404).into();
        assert!(matches!(err, DownloadError::HttpError { status: 404, .. }));
    }

    #[test]
    fn test_error_source_chain() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DownloadError::Io(io_err);

        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_not_found());
    }
}
