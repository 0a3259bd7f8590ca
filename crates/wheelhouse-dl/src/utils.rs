use percent_encoding::percent_decode_str;
use ureq::http::HeaderValue;
use url::Url;

/// Whether a label names a remote resource rather than a package or local path.
pub fn is_url(label: &str) -> bool {
    Url::parse(label).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Extract the percent-decoded last path segment of a URL.
pub fn filename_from_url(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .and_then(|s| {
                percent_decode_str(s)
                    .decode_utf8()
                    .ok()
                    .map(|cow| cow.into_owned())
            })
    })
}

/// Extract filename from Content-Disposition header
pub fn filename_from_header(value: &HeaderValue) -> Option<String> {
    value
        .to_str()
        .ok()?
        .split(';')
        .find_map(|p| p.trim().strip_prefix("filename="))
        .map(|s| s.trim_matches('"').to_string())
        .and_then(|s| s.split(['/', '\\']).next_back().map(String::from))
        .filter(|s| !s.is_empty())
}

/// Splits a `#md5=<digest>` fragment off a distribution link.
pub fn split_md5_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((base, fragment)) => {
            let digest = fragment
                .strip_prefix("md5=")
                .filter(|digest| !digest.is_empty());
            (base, digest)
        }
        None => (url, None),
    }
}
