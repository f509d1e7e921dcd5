//! Basename of a URL path.

/// Last non-empty path segment of `url`, percent-decoded.
///
/// `None` for unparseable URLs and for root-only paths.
pub fn url_basename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode_lossy(segment);
    match decoded.as_str() {
        "." | ".." => None,
        _ => Some(decoded),
    }
}

fn percent_decode_lossy(segment: &str) -> String {
    match super::content_disposition::percent_decode(segment) {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => segment.to_string(),
    }
}
