//! Validated mount request: what to mount and where to link it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::MountError;

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Credentials {
    /// Parses `user:pass`, splitting on the first colon.
    ///
    /// The password may contain further colons or be empty; the user may not.
    pub fn parse(raw: &str) -> Result<Self, MountError> {
        match raw.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok(Self {
                user: user.to_string(),
                pass: pass.to_string(),
            }),
            _ => Err(MountError::InvalidAuth),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"***")
            .finish()
    }
}

/// Everything a mount needs from the caller, checked once at entry.
#[derive(Debug, Clone)]
pub struct MountRequest {
    /// Remote resource (http or https).
    pub target_url: String,
    /// Directory that receives the symlink.
    pub destination_dir: PathBuf,
    pub auth: Option<Credentials>,
}

impl MountRequest {
    /// Validates the URL, the destination directory and the optional `user:pass`.
    ///
    /// `destination` defaults to the current working directory.
    pub fn new(
        target_url: &str,
        destination: Option<&Path>,
        auth: Option<&str>,
    ) -> Result<Self, MountError> {
        let parsed = url::Url::parse(target_url).map_err(|e| MountError::InvalidUrl {
            url: target_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MountError::InvalidUrl {
                url: target_url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let destination_dir = match destination {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()
                .map_err(|_| MountError::InvalidTarget(PathBuf::from(".")))?,
        };
        let is_dir = fs::metadata(&destination_dir)
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(MountError::InvalidTarget(destination_dir));
        }

        let auth = auth.map(Credentials::parse).transpose()?;

        Ok(Self {
            target_url: target_url.to_string(),
            destination_dir,
            auth,
        })
    }
}
