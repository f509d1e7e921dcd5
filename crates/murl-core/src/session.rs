//! Mount lifecycle: probe, mount, publish the link, tear down.
//!
//! ```text
//! Idle -> Probing -> (Probed | ProbeFailed) -> Mounting -> (Mounted | MountFailed)
//!      -> LinkPublished -> Active -> Unmounting -> Idle
//! ```
//!
//! A [`MountSession`] owns every side effect it creates: the mount directory,
//! the registration with the kernel bridge, and the symlink. Teardown undoes
//! only what this session created, each step independently, and is safe to
//! call any number of times (explicitly, from a signal handler path, or on drop).

use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bridge::{ActiveMount, FuseBridge, MountBridge};
use crate::config::MurlConfig;
use crate::error::MountError;
use crate::fs::UrlFs;
use crate::probe;
use crate::read::RangeReader;
use crate::request::MountRequest;
use crate::table::RemoteFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Idle,
    Probing,
    Probed,
    ProbeFailed,
    Mounting,
    Mounted,
    MountFailed,
    LinkPublished,
    Active,
    Unmounting,
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MountState::Idle => "idle",
            MountState::Probing => "probing",
            MountState::Probed => "probed",
            MountState::ProbeFailed => "probe-failed",
            MountState::Mounting => "mounting",
            MountState::Mounted => "mounted",
            MountState::MountFailed => "mount-failed",
            MountState::LinkPublished => "link-published",
            MountState::Active => "active",
            MountState::Unmounting => "unmounting",
        };
        f.write_str(s)
    }
}

/// Parent of all mount directories: `<tmp>/mounturl`.
pub fn default_mount_root() -> PathBuf {
    std::env::temp_dir().join("mounturl")
}

/// Fresh mount directory name: unix millis plus a per-process sequence number.
fn mount_dir_name() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    if seq == 0 {
        millis.to_string()
    } else {
        format!("{}-{}", millis, seq)
    }
}

/// One mount of one remote file.
pub struct MountSession {
    target_url: String,
    mount_path: PathBuf,
    symlink_path: Option<PathBuf>,
    state: MountState,
    file: Option<Arc<RemoteFile>>,
    bridge: Box<dyn MountBridge>,
    active: Option<Box<dyn ActiveMount>>,
    mount_dir_created: bool,
    link_published: bool,
}

impl MountSession {
    /// Mounts `request` through FUSE under [`default_mount_root`].
    pub fn mount(request: &MountRequest, cfg: &MurlConfig) -> Result<Self, MountError> {
        Self::mount_with(
            request,
            cfg,
            Box::new(FuseBridge::new(cfg.auto_unmount)),
            &default_mount_root(),
        )
    }

    /// Mounts `request` through `bridge`, with the mount directory under `mount_root`.
    ///
    /// On any failure the partial work is torn down before the error returns.
    pub fn mount_with(
        request: &MountRequest,
        cfg: &MurlConfig,
        bridge: Box<dyn MountBridge>,
        mount_root: &Path,
    ) -> Result<Self, MountError> {
        let mut session = Self {
            target_url: request.target_url.clone(),
            mount_path: mount_root.join(mount_dir_name()),
            symlink_path: None,
            state: MountState::Idle,
            file: None,
            bridge,
            active: None,
            mount_dir_created: false,
            link_published: false,
        };
        tracing::debug!(mount_path = %session.mount_path.display(), "mount requested");

        session.transition(MountState::Probing);
        let probed = probe::probe(&request.target_url, request.auth.as_ref(), cfg)
            .and_then(|p| p.ensure_ranged().map(|()| p));
        let probed = match probed {
            Ok(p) => p,
            Err(e) => {
                session.transition(MountState::ProbeFailed);
                tracing::warn!(url = %request.target_url, "probe failed: {}", e);
                return Err(e);
            }
        };
        session.transition(MountState::Probed);

        let file = Arc::new(RemoteFile::from_probe(probed, cfg.default_length));
        tracing::info!(
            url = %request.target_url,
            name = %file.display_name,
            length = file.length,
            "remote file"
        );
        session.symlink_path = Some(request.destination_dir.join(&file.display_name));
        session.file = Some(Arc::clone(&file));

        session.transition(MountState::Mounting);
        if let Err(e) = session.register(&file, request, cfg) {
            session.transition(MountState::MountFailed);
            session.teardown();
            return Err(MountError::Mount(e));
        }
        session.transition(MountState::Mounted);

        if let Err(e) = session.publish_link(&file) {
            session.teardown();
            return Err(MountError::Symlink(e));
        }
        session.transition(MountState::LinkPublished);

        session.transition(MountState::Active);
        Ok(session)
    }

    /// Stale unmount, mount directory, bridge registration.
    fn register(
        &mut self,
        file: &Arc<RemoteFile>,
        request: &MountRequest,
        cfg: &MurlConfig,
    ) -> io::Result<()> {
        self.bridge.force_unmount(&self.mount_path);
        fs::create_dir_all(&self.mount_path)?;
        self.mount_dir_created = true;

        let reader = Arc::new(RangeReader::new(
            &request.target_url,
            request.auth.clone(),
            cfg,
        ));
        let urlfs = UrlFs::new(Arc::clone(file), reader, cfg.attr_ttl());
        self.active = Some(self.bridge.mount(urlfs, &self.mount_path)?);
        Ok(())
    }

    fn publish_link(&mut self, file: &RemoteFile) -> io::Result<()> {
        let link = self
            .symlink_path
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no symlink path"))?;
        let target = self.mount_path.join(&file.display_name);
        std::os::unix::fs::symlink(&target, link)?;
        self.link_published = true;
        tracing::info!(link = %link.display(), target = %target.display(), "symlink published");
        Ok(())
    }

    /// Removes the symlink, unmounts, and removes the mount directory.
    ///
    /// Each step runs regardless of the others; failures are logged and
    /// swallowed. Only artifacts this session created are touched. Returns
    /// once everything has been attempted.
    pub fn teardown(&mut self) {
        if self.state == MountState::Idle {
            return;
        }
        self.transition(MountState::Unmounting);

        if self.link_published {
            self.link_published = false;
            if let Some(link) = &self.symlink_path {
                remove_own_link(link, &self.mount_path);
            }
        }

        match self.active.take() {
            Some(active) => active.unmount(),
            None if self.mount_dir_created => self.bridge.force_unmount(&self.mount_path),
            None => {}
        }

        if self.mount_dir_created {
            self.mount_dir_created = false;
            if let Err(e) = fs::remove_dir(&self.mount_path) {
                tracing::debug!(path = %self.mount_path.display(), "mount dir not removed: {}", e);
            }
        }

        self.transition(MountState::Idle);
    }

    /// Keeps the mount up until `shutdown` resolves, then tears it down.
    ///
    /// Returns the shutdown value once the symlink is gone and the bridge has
    /// unmounted. Reads still in flight are not waited for.
    pub async fn serve_until<F: Future>(mut self, shutdown: F) -> F::Output {
        let reason = shutdown.await;
        tracing::info!(mount_path = %self.mount_path.display(), "shutdown requested");
        self.teardown();
        reason
    }

    fn transition(&mut self, next: MountState) {
        tracing::debug!(from = %self.state, to = %next, "mount state");
        self.state = next;
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// Location of the published symlink (known once the probe succeeded).
    pub fn symlink_path(&self) -> Option<&Path> {
        self.symlink_path.as_deref()
    }

    pub fn file(&self) -> Option<&RemoteFile> {
        self.file.as_deref()
    }
}

/// Unlinks `link` only if it is still the symlink into `mount_path`.
fn remove_own_link(link: &Path, mount_path: &Path) {
    match fs::read_link(link) {
        Ok(target) if target.starts_with(mount_path) => {
            if let Err(e) = fs::remove_file(link) {
                tracing::debug!(link = %link.display(), "symlink not removed: {}", e);
            }
        }
        Ok(_) => tracing::warn!(link = %link.display(), "symlink was replaced; leaving it"),
        Err(e) => tracing::debug!(link = %link.display(), "symlink already gone: {}", e),
    }
}

impl Drop for MountSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for MountSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountSession")
            .field("target_url", &self.target_url)
            .field("mount_path", &self.mount_path)
            .field("symlink_path", &self.symlink_path)
            .field("state", &self.state)
            .field("file", &self.file)
            .field("mounted", &self.active.is_some())
            .finish()
    }
}
