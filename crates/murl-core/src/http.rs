//! Shared libcurl handle setup for the probe and for ranged reads.

use std::time::Duration;

use crate::request::Credentials;

const USER_AGENT: &str = concat!("mount-url/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: u32 = 10;

/// Builds an Easy handle for `url`: redirects followed, basic auth applied.
pub(crate) fn new_easy(
    url: &str,
    auth: Option<&Credentials>,
    connect_timeout: Duration,
) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.useragent(USER_AGENT)?;
    easy.follow_location(true)?;
    easy.max_redirections(MAX_REDIRECTS)?;
    easy.connect_timeout(connect_timeout)?;
    if let Some(creds) = auth {
        easy.username(&creds.user)?;
        easy.password(&creds.pass)?;
    }
    Ok(easy)
}

/// True for the first line of a response header block (`HTTP/1.1 206 ...`).
///
/// Each redirect hop starts a new block; callers reset what they collected.
pub(crate) fn is_status_line(line: &str) -> bool {
    line.starts_with("HTTP/")
}

/// Splits a raw header line into a lower-cased name and trimmed value.
pub(crate) fn split_header(line: &str) -> Option<(String, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), value.trim()))
}

/// First byte of a `Content-Range: bytes <start>-<end>/<total>` value.
///
/// `None` for unsatisfied ranges (`bytes */1000`) and other units.
pub(crate) fn content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}
