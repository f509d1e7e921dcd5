//! HTTP range probing.
//!
//! Issues one GET against the target, keeps the response headers and aborts
//! the body on its first chunk. The headers decide whether the mount can
//! proceed (`Accept-Ranges: bytes`), how large the file is, and what it is
//! called.

mod parse;

use std::collections::HashMap;
use std::str;

use crate::config::MurlConfig;
use crate::error::MountError;
use crate::http;
use crate::request::Credentials;
use crate::url_model;

/// What the probe learned about the remote resource.
#[derive(Debug, Clone)]
pub struct Probe {
    /// HTTP status of the final response.
    pub status: u32,
    /// Headers of the final response, names lower-cased.
    pub headers: HashMap<String, String>,
    /// Resolved entry name (Content-Disposition, else URL basename).
    pub display_name: String,
}

impl Probe {
    /// Builds a probe result from a status and the final header map.
    ///
    /// `Content-Disposition` only names the file on a 200 response.
    pub fn from_response(url: &str, status: u32, headers: HashMap<String, String>) -> Self {
        let disposition = if status == 200 {
            headers.get("content-disposition").map(String::as_str)
        } else {
            None
        };
        let display_name = url_model::display_name(url, disposition);
        Self {
            status,
            headers,
            display_name,
        }
    }

    /// `Content-Length` of the full resource, if the server sent a usable one.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// True if the server advertised `Accept-Ranges: bytes`.
    pub fn accepts_byte_ranges(&self) -> bool {
        self.headers
            .get("accept-ranges")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"))
    }

    /// Fails with [`MountError::RangeUnsupported`] unless byte ranges are advertised.
    pub fn ensure_ranged(&self) -> Result<(), MountError> {
        if self.accepts_byte_ranges() {
            Ok(())
        } else {
            Err(MountError::RangeUnsupported)
        }
    }
}

/// Probes `url` with a single GET. No retry.
///
/// Transport failures map to [`MountError::ProbeNetwork`], non-2xx statuses to
/// [`MountError::ProbeHttpStatus`]. Range support is checked separately with
/// [`Probe::ensure_ranged`].
pub fn probe(
    url: &str,
    auth: Option<&Credentials>,
    cfg: &MurlConfig,
) -> Result<Probe, MountError> {
    let mut lines: Vec<String> = Vec::new();

    let mut easy =
        http::new_easy(url, auth, cfg.connect_timeout()).map_err(MountError::ProbeNetwork)?;
    easy.timeout(cfg.probe_timeout())
        .map_err(MountError::ProbeNetwork)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(MountError::ProbeNetwork)?;
        // Headers are all we need; refusing the first body chunk aborts the transfer.
        transfer
            .write_function(|_| Ok(0))
            .map_err(MountError::ProbeNetwork)?;
        transfer.perform()
    };

    match performed {
        Ok(()) => {}
        Err(e) if e.is_write_error() => {}
        Err(e) => return Err(MountError::ProbeNetwork(e)),
    }

    let status = easy.response_code().map_err(MountError::ProbeNetwork)?;
    tracing::debug!(url, status, header_lines = lines.len(), "probe response");
    if !(200..300).contains(&status) {
        return Err(MountError::ProbeHttpStatus(status));
    }

    Ok(Probe::from_response(url, status, parse::final_headers(&lines)))
}
