use ureq::{http::Response, Body};

use crate::{error::DownloadError, http_client::shared_agent};

pub struct Http;

impl Http {
    pub fn fetch(url: &str) -> Result<Response<Body>, DownloadError> {
        shared_agent()
            .get(url)
            .call()
            .map_err(|err| with_url(err, url))
    }

    /// Fetches `url` and reads the whole body as text.
    pub fn text(url: &str) -> Result<String, DownloadError> {
        shared_agent()
            .get(url)
            .header("Accept", "text/html")
            .call()
            .map_err(|err| with_url(err, url))?
            .body_mut()
            .read_to_string()
            .map_err(|_| DownloadError::InvalidResponse)
    }
}

fn with_url(err: ureq::Error, url: &str) -> DownloadError {
    match err {
        ureq::Error::StatusCode(status) => {
            DownloadError::HttpError {
                status,
                url: url.to_string(),
            }
        }
        err => DownloadError::from(err),
    }
}
