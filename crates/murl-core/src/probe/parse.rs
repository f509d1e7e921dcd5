//! Fold raw header lines into the header map of the final response.

use std::collections::HashMap;

use crate::http::{is_status_line, split_header};

/// Builds the header map from collected lines.
///
/// Only the last response block counts: a redirect's headers are discarded
/// when the next status line arrives. Repeated headers are joined with `", "`.
pub(crate) fn final_headers(lines: &[String]) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = HashMap::new();
    for line in lines {
        let line = line.trim();
        if is_status_line(line) {
            headers.clear();
            continue;
        }
        if let Some((name, value)) = split_header(line) {
            headers
                .entry(name)
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
    }
    headers
}
