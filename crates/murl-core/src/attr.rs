//! Metadata answers for the root directory and the single file.

use std::os::raw::c_int;
use std::time::SystemTime;

use crate::table::RemoteFile;

/// Permission bits of the root directory (mode 040755).
pub const ROOT_PERM: u16 = 0o755;
/// Permission bits of the file (mode 0100666).
pub const FILE_PERM: u16 = 0o666;
/// Placeholder size reported for the root directory.
pub const ROOT_SIZE: u64 = 100;

/// Owner of every entry: the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

impl Identity {
    pub fn current() -> Self {
        // SAFETY: getuid/getgid have no preconditions and cannot fail.
        unsafe {
            Self {
                uid: libc::getuid(),
                gid: libc::getgid(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
}

/// Attributes of one entry, stamped at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub kind: EntryKind,
    pub perm: u16,
    pub size: u64,
    pub time: SystemTime,
    pub uid: u32,
    pub gid: u32,
}

impl Attributes {
    /// Full st_mode (type bits plus permissions).
    pub fn mode(&self) -> u32 {
        let type_bits = match self.kind {
            EntryKind::Directory => libc::S_IFDIR,
            EntryKind::RegularFile => libc::S_IFREG,
        };
        type_bits as u32 | u32::from(self.perm)
    }
}

/// How a path relates to the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Root,
    /// Dot-prefixed name directly under root (`/.DS_Store`, `/.hidden`).
    Hidden,
    /// Any other path while no remote file is established.
    Unestablished,
    File,
    Other,
}

pub fn classify(path: &str, file: Option<&RemoteFile>) -> PathClass {
    if path.starts_with("/.") {
        return PathClass::Hidden;
    }
    if path == "/" {
        return PathClass::Root;
    }
    match file {
        None => PathClass::Unestablished,
        Some(f) if path.strip_prefix('/') == Some(f.display_name.as_str()) => PathClass::File,
        Some(_) => PathClass::Other,
    }
}

/// Answers a metadata query for `path`, or the errno to report.
///
/// Hidden probes and queries before a file exists get `EPERM`; unknown paths
/// get `ENOENT`.
pub fn getattr(
    path: &str,
    file: Option<&RemoteFile>,
    owner: Identity,
) -> Result<Attributes, c_int> {
    let now = SystemTime::now();
    match classify(path, file) {
        PathClass::Root => Ok(Attributes {
            kind: EntryKind::Directory,
            perm: ROOT_PERM,
            size: ROOT_SIZE,
            time: now,
            uid: owner.uid,
            gid: owner.gid,
        }),
        PathClass::Hidden | PathClass::Unestablished => Err(libc::EPERM),
        PathClass::File => {
            let length = file.map(|f| f.length).unwrap_or_default();
            Ok(Attributes {
                kind: EntryKind::RegularFile,
                perm: FILE_PERM,
                size: length,
                time: now,
                uid: owner.uid,
                gid: owner.gid,
            })
        }
        PathClass::Other => Err(libc::ENOENT),
    }
}
