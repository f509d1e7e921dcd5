//! Error kinds for a mount attempt and for individual reads.
//!
//! Mount-phase errors are terminal for the attempt and surface once to the
//! caller. Read errors are scoped to one kernel call and map to an errno.

use std::io;
use std::os::raw::c_int;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a mount attempt (probe, registration, or link publication).
#[derive(Debug, Error)]
pub enum MountError {
    /// Destination for the symlink is missing or not a directory.
    #[error("Invalid symlink path: {}", .0.display())]
    InvalidTarget(PathBuf),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// `auth` was not of the form `user:pass`.
    #[error("Invalid auth, expected user:pass")]
    InvalidAuth,

    /// DNS, connect, TLS or other transport failure during the probe.
    #[error("Probe failed: {0}")]
    ProbeNetwork(#[source] curl::Error),

    #[error("HTTP Error {0}")]
    ProbeHttpStatus(u32),

    #[error(
        "The HTTP server supplied doesn't support accept-ranges: bytes, so mount-url won't work for this url"
    )]
    RangeUnsupported,

    #[error("Mount error: {0}")]
    Mount(#[source] io::Error),

    #[error("Symlink error: {0}")]
    Symlink(#[source] io::Error),
}

/// Failure of one ranged read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// No remote file is established for this mount.
    #[error("no remote file")]
    NoEntity,

    #[error("range request failed: {0}")]
    Network(#[source] curl::Error),

    /// Server answered with a status the engine cannot place at the offset.
    #[error("range request returned HTTP {0}")]
    UnexpectedStatus(u32),
}

impl ReadError {
    /// Errno reported to the kernel for this failure.
    pub fn errno(&self) -> c_int {
        match self {
            ReadError::NoEntity => libc::ENOENT,
            ReadError::Network(_) | ReadError::UnexpectedStatus(_) => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_message_matches_cli_contract() {
        assert_eq!(MountError::ProbeHttpStatus(404).to_string(), "HTTP Error 404");
    }

    #[test]
    fn read_errors_map_to_errno() {
        assert_eq!(ReadError::NoEntity.errno(), libc::ENOENT);
        assert_eq!(ReadError::UnexpectedStatus(500).errno(), libc::EIO);
    }

    #[test]
    fn range_unsupported_is_descriptive() {
        assert!(MountError::RangeUnsupported
            .to_string()
            .contains("accept-ranges: bytes"));
    }
}
