//! Entry-name sanitization.

/// Linux NAME_MAX, in bytes.
const NAME_MAX: usize = 255;

/// Makes `name` usable as the single entry under the mount root and as the
/// symlink name in the destination directory.
///
/// Path separators, NUL and control characters become `_`. Leading dots are
/// dropped so the entry is never hidden (dot-prefixed lookups are refused by
/// the filesystem). Surrounding whitespace is trimmed and the result is cut
/// to NAME_MAX bytes on a char boundary.
pub fn sanitize_entry_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim().trim_start_matches('.').trim_start();

    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
