//! Seam between the lifecycle manager and the kernel bridge.
//!
//! [`FuseBridge`] mounts through `fuser` in a background session. Tests drive
//! the lifecycle through their own [`MountBridge`] without touching the kernel.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use fuser::MountOption;

use crate::fs::UrlFs;

/// A registered mount. Unmounting consumes it.
pub trait ActiveMount: Send {
    fn unmount(self: Box<Self>);
}

/// Registers filesystems with the OS and removes stale registrations.
pub trait MountBridge: Send {
    /// Unmounts whatever is mounted at `mountpoint`; absence is not an error.
    fn force_unmount(&self, mountpoint: &Path);

    /// Mounts `fs` at `mountpoint` and returns once the mount is serving.
    fn mount(&self, fs: UrlFs, mountpoint: &Path) -> io::Result<Box<dyn ActiveMount>>;
}

/// Kernel bridge backed by `fuser`.
#[derive(Debug, Clone, Default)]
pub struct FuseBridge {
    pub auto_unmount: bool,
}

impl FuseBridge {
    pub fn new(auto_unmount: bool) -> Self {
        Self { auto_unmount }
    }

    fn mount_options(&self) -> Vec<MountOption> {
        let mut opts = vec![
            MountOption::FSName("mount-url".to_owned()),
            MountOption::Subtype("murl".to_owned()),
            MountOption::RO,
            MountOption::NoAtime,
        ];
        if self.auto_unmount {
            opts.push(MountOption::AutoUnmount);
        }
        opts
    }
}

struct FuseMount(fuser::BackgroundSession);

impl ActiveMount for FuseMount {
    fn unmount(self: Box<Self>) {
        // Dropping the background session unmounts the filesystem.
        drop(self.0);
    }
}

impl MountBridge for FuseBridge {
    fn force_unmount(&self, mountpoint: &Path) {
        for tool in ["fusermount3", "fusermount"] {
            let status = Command::new(tool)
                .arg("-u")
                .arg("-z")
                .arg("-q")
                .arg(mountpoint)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(s) => {
                    tracing::trace!(tool, path = %mountpoint.display(), success = s.success(), "stale unmount");
                    return;
                }
                // Tool not installed; try the next name.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::debug!(tool, "stale unmount failed to run: {}", e);
                    return;
                }
            }
        }
    }

    fn mount(&self, fs: UrlFs, mountpoint: &Path) -> io::Result<Box<dyn ActiveMount>> {
        let session = fuser::spawn_mount2(fs, mountpoint, &self.mount_options())?;
        tracing::info!(path = %mountpoint.display(), "FUSE mount active");
        Ok(Box::new(FuseMount(session)))
    }
}
