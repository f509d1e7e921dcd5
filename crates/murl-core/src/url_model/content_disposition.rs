//! `Content-Disposition` filename extraction (`filename` and RFC 5987 `filename*`).

/// Returns the filename carried by a `Content-Disposition` value, if any.
///
/// An extended `filename*=charset''pct-encoded` parameter wins over a plain
/// `filename=`. Absence or malformed input yields `None`; that is the normal
/// fallback path, not an error.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for (name, raw) in parameters(value) {
        if name.eq_ignore_ascii_case("filename*") {
            extended = extended.or_else(|| decode_ext_value(raw));
        } else if name.eq_ignore_ascii_case("filename") {
            plain = plain.or_else(|| Some(unquote(raw)).filter(|s| !s.is_empty()));
        }
    }

    extended.or(plain)
}

/// Splits `type; a=b; c="d; e"` into `(name, raw value)` pairs, honoring quotes.
fn parameters(value: &str) -> Vec<(&str, &str)> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_quotes => escaped = true,
            b'"' => in_quotes = !in_quotes,
            b';' if !in_quotes => {
                split_param(&value[start..i], &mut params);
                start = i + 1;
            }
            _ => {}
        }
    }
    split_param(&value[start..], &mut params);
    params
}

fn split_param<'a>(piece: &'a str, params: &mut Vec<(&'a str, &'a str)>) {
    if let Some((name, raw)) = piece.split_once('=') {
        params.push((name.trim(), raw.trim()));
    }
}

/// Strips surrounding quotes and resolves `\"` / `\\` escapes.
fn unquote(raw: &str) -> String {
    let inner = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => inner,
        None => return raw.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Decodes `charset'lang'pct-encoded`. UTF-8 and ISO-8859-1 are understood.
fn decode_ext_value(raw: &str) -> Option<String> {
    let raw = raw.trim_matches('"');
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _lang = parts.next()?;
    let encoded = parts.next()?;
    let bytes = percent_decode(encoded)?;
    let decoded = if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).ok()?
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        bytes.iter().map(|&b| b as char).collect()
    } else {
        return None;
    };
    Some(decoded).filter(|s| !s.is_empty())
}

/// Strict percent-decoding: a malformed escape rejects the whole value.
pub(super) fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}
