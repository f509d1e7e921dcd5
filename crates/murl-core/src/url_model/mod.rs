//! Display name for the mounted file.
//!
//! The name comes from `Content-Disposition` when the probe response carries a
//! parseable one, otherwise from the last segment of the URL path. Either way
//! it is sanitized so it can live as a single entry under the mount root.

mod content_disposition;
mod path;
mod sanitize;

pub use content_disposition::filename_from_content_disposition;
pub use path::url_basename;
pub use sanitize::sanitize_entry_name;

/// Name used when neither the header nor the URL yield anything usable.
pub const FALLBACK_NAME: &str = "download.bin";

/// Resolves the single entry name shown under the mount root.
///
/// - `display_name("https://example.com/file.bin", None)` → `"file.bin"`
/// - `display_name("https://example.com/get?id=1", Some("attachment; filename=\"a.iso\""))` → `"a.iso"`
pub fn display_name(url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(filename_from_content_disposition)
        .map(|name| sanitize_entry_name(&name))
        .filter(|name| !name.is_empty())
        .or_else(|| {
            url_basename(url)
                .map(|name| sanitize_entry_name(&name))
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}
