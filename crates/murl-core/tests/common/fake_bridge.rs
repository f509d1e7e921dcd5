//! In-process stand-in for the kernel bridge.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use murl_core::bridge::{ActiveMount, MountBridge};
use murl_core::fs::UrlFs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    ForceUnmount(PathBuf),
    Mount(PathBuf),
    Unmount(PathBuf),
}

/// Records every call; optionally refuses to mount.
#[derive(Clone, Default)]
pub struct FakeBridge {
    pub events: Arc<Mutex<Vec<BridgeEvent>>>,
    pub fail_mount: bool,
}

impl FakeBridge {
    pub fn failing() -> Self {
        Self {
            fail_mount: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<BridgeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn unmount_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, BridgeEvent::Unmount(_)))
            .count()
    }
}

struct FakeMount {
    path: PathBuf,
    events: Arc<Mutex<Vec<BridgeEvent>>>,
    _fs: UrlFs,
}

impl ActiveMount for FakeMount {
    fn unmount(self: Box<Self>) {
        self.events
            .lock()
            .unwrap()
            .push(BridgeEvent::Unmount(self.path.clone()));
    }
}

impl MountBridge for FakeBridge {
    fn force_unmount(&self, mountpoint: &Path) {
        self.events
            .lock()
            .unwrap()
            .push(BridgeEvent::ForceUnmount(mountpoint.to_path_buf()));
    }

    fn mount(&self, fs: UrlFs, mountpoint: &Path) -> io::Result<Box<dyn ActiveMount>> {
        if self.fail_mount {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "fuse unavailable"));
        }
        self.events
            .lock()
            .unwrap()
            .push(BridgeEvent::Mount(mountpoint.to_path_buf()));
        Ok(Box::new(FakeMount {
            path: mountpoint.to_path_buf(),
            events: Arc::clone(&self.events),
            _fs: fs,
        }))
    }
}
