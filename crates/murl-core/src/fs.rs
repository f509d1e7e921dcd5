//! FUSE adapter: kernel requests in, responder and read engine out.
//!
//! The tree has two inodes: the root directory and the remote file. Metadata
//! is answered inline on the session thread. Each read first takes a slot
//! from the reader's gate on the session thread, then hands the slot and the
//! reply to a worker thread. Worker threads are therefore bounded by
//! `max_inflight_reads`; once every slot is busy the session thread waits
//! for one to free.

use std::ffi::OsStr;
use std::fmt;
use std::os::raw::c_int;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr,
    Request,
};
use tracing::{debug, trace, warn};

use crate::attr::{self, Attributes, EntryKind, Identity};
use crate::read::{RangeReader, RangeRequest};
use crate::table::RemoteFile;

pub const ROOT_INO: u64 = fuser::FUSE_ROOT_ID;
pub const FILE_INO: u64 = 2;

/// Errno for every operation that would modify the tree.
pub const READ_ONLY_ERRNO: c_int = libc::EPERM;

/// Value for every statfs field; the filesystem has no real capacity.
const STATFS_FILLER: u64 = 1_000_000;
const NAME_MAX: u32 = 255;
const BLOCK_SIZE: u32 = 4096;

/// Read-only filesystem exposing one remote file.
pub struct UrlFs {
    file: Arc<RemoteFile>,
    reader: Arc<RangeReader>,
    owner: Identity,
    ttl: Duration,
}

impl UrlFs {
    pub fn new(file: Arc<RemoteFile>, reader: Arc<RangeReader>, ttl: Duration) -> Self {
        Self {
            file,
            reader,
            owner: Identity::current(),
            ttl,
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        match ino {
            ROOT_INO => Some("/".to_string()),
            FILE_INO => Some(self.file.entry_path()),
            _ => None,
        }
    }

    fn attr_for(&self, path: &str) -> Result<FileAttr, c_int> {
        attr::getattr(path, Some(&self.file), self.owner).map(to_file_attr)
    }

    /// Attributes for `name` under `parent`.
    fn entry(&self, parent: u64, name: &OsStr) -> Result<FileAttr, c_int> {
        if parent != ROOT_INO {
            return Err(libc::ENOENT);
        }
        self.attr_for(&format!("/{}", name.to_string_lossy()))
    }

    /// Directory entries of `ino` from `offset` on, each with the offset of
    /// the entry after it.
    fn listing(&self, ino: u64, offset: i64) -> Result<Vec<DirEntry<'_>>, c_int> {
        match ino {
            ROOT_INO => {}
            FILE_INO => return Err(libc::ENOTDIR),
            _ => return Err(libc::ENOENT),
        }
        let [name] = self.file.root_entries();
        let entries = [
            (ROOT_INO, FileType::Directory, "."),
            (ROOT_INO, FileType::Directory, ".."),
            (FILE_INO, FileType::RegularFile, name),
        ];
        let skip = usize::try_from(offset).unwrap_or(0);
        Ok(entries
            .into_iter()
            .enumerate()
            .skip(skip)
            .map(|(i, (ino, kind, name))| DirEntry {
                ino,
                next_offset: (i + 1) as i64,
                kind,
                name,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirEntry<'a> {
    ino: u64,
    next_offset: i64,
    kind: FileType,
    name: &'a str,
}

/// Byte offset to read from, or the errno when `ino` is not readable.
fn read_target(ino: u64, offset: i64) -> Result<u64, c_int> {
    match ino {
        FILE_INO => u64::try_from(offset).map_err(|_| libc::EINVAL),
        ROOT_INO => Err(libc::EISDIR),
        _ => Err(libc::ENOENT),
    }
}

/// Logs whether the kernel granted concurrent reads; true if it did.
fn async_reads_granted<E: fmt::Debug>(added: Result<(), E>) -> bool {
    match added {
        Ok(()) => true,
        Err(rejected) => {
            debug!(rejected = ?rejected, "kernel refused FUSE_ASYNC_READ; reads are serialized");
            false
        }
    }
}

fn refuse(op: &'static str, ino: u64) -> c_int {
    debug!(op, ino, "refused on read-only mount");
    READ_ONLY_ERRNO
}

fn to_file_attr(a: Attributes) -> FileAttr {
    let (ino, kind, nlink) = match a.kind {
        EntryKind::Directory => (ROOT_INO, FileType::Directory, 2),
        EntryKind::RegularFile => (FILE_INO, FileType::RegularFile, 1),
    };
    FileAttr {
        ino,
        size: a.size,
        blocks: a.size.div_ceil(512),
        atime: a.time,
        mtime: a.time,
        ctime: a.time,
        crtime: UNIX_EPOCH,
        kind,
        perm: a.perm,
        nlink,
        uid: a.uid,
        gid: a.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

impl Filesystem for UrlFs {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> Result<(), c_int> {
        // Lets the kernel keep several reads outstanding; each gets its own worker.
        let async_reads =
            async_reads_granted(config.add_capabilities(fuser::consts::FUSE_ASYNC_READ));
        debug!(
            name = %self.file.display_name,
            length = self.file.length,
            async_reads,
            "filesystem ready"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        debug!("filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, name = ?name, "lookup");
        match self.entry(parent, name) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        trace!(ino, path = %path, "getattr");
        match self.attr_for(&path) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.listing(ino, offset) {
            Ok(entries) => entries,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        for e in entries {
            if reply.add(e.ino, e.next_offset, e.kind, e.name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(ino, "open");
        reply.opened(0, 0);
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let offset = match read_target(ino, offset) {
            Ok(offset) => offset,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        let req = RangeRequest {
            offset,
            length: size,
        };
        let permit = self.reader.gate().acquire();
        let file = Arc::clone(&self.file);
        let reader = Arc::clone(&self.reader);
        let spawned = thread::Builder::new()
            .name("murl-read".into())
            .spawn(move || {
                let mut buf = vec![0u8; req.length as usize];
                match reader.read_with_permit(permit, Some(&file), req, &mut buf) {
                    Ok(n) => reply.data(&buf[..n]),
                    Err(e) => {
                        warn!(offset = req.offset, size = req.length, "read failed: {}", e);
                        reply.error(e.errno());
                    }
                }
            });
        // On spawn failure the reply and permit are dropped; fuser answers EIO.
        if let Err(e) = spawned {
            warn!(offset, size, "could not spawn read worker: {}", e);
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        _data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        reply.error(refuse("write", ino));
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(refuse("unlink", parent));
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        _name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        reply.error(refuse("rename", parent));
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        reply.error(refuse("mkdir", parent));
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(refuse("rmdir", parent));
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        reply.error(refuse("create", parent));
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _name: &OsStr,
        _size: u32,
        reply: ReplyXattr,
    ) {
        reply.error(libc::EPERM);
    }

    // Accepted and dropped.
    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _name: &OsStr,
        _value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        reply.statfs(
            STATFS_FILLER,
            STATFS_FILLER,
            STATFS_FILLER,
            STATFS_FILLER,
            STATFS_FILLER,
            BLOCK_SIZE,
            NAME_MAX,
            BLOCK_SIZE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MurlConfig;
    use std::collections::HashMap;
    use std::time::SystemTime;

    fn urlfs(max_inflight_reads: usize) -> UrlFs {
        let file = Arc::new(RemoteFile {
            length: 10 * 1024 * 1024,
            display_name: "file.bin".into(),
            source_headers: HashMap::new(),
        });
        let cfg = MurlConfig {
            max_inflight_reads,
            ..MurlConfig::default()
        };
        // Nothing here sends a request.
        let reader = Arc::new(RangeReader::new("http://127.0.0.1:9/file.bin", None, &cfg));
        UrlFs::new(file, reader, Duration::from_secs(1))
    }

    #[test]
    fn root_lists_exactly_one_entry() {
        let fs = urlfs(1);
        let all = fs.listing(ROOT_INO, 0).unwrap();
        let names: Vec<_> = all.iter().map(|e| e.name).collect();
        assert_eq!(names, [".", "..", "file.bin"]);
        let files: Vec<_> = all.iter().filter(|e| e.kind == FileType::RegularFile).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].ino, FILE_INO);
        assert_eq!(
            all.iter().map(|e| e.next_offset).collect::<Vec<_>>(),
            [1, 2, 3]
        );
    }

    #[test]
    fn listing_resumes_from_offset() {
        let fs = urlfs(1);
        let rest = fs.listing(ROOT_INO, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "file.bin");
        assert_eq!(rest[0].next_offset, 3);
        assert!(fs.listing(ROOT_INO, 3).unwrap().is_empty());
        // A negative offset restarts the listing.
        assert_eq!(fs.listing(ROOT_INO, -1).unwrap().len(), 3);
    }

    #[test]
    fn listing_non_directories_fails() {
        let fs = urlfs(1);
        assert_eq!(fs.listing(FILE_INO, 0).unwrap_err(), libc::ENOTDIR);
        assert_eq!(fs.listing(42, 0).unwrap_err(), libc::ENOENT);
    }

    #[test]
    fn lookup_resolves_only_the_file_under_root() {
        let fs = urlfs(1);
        let attr = fs.entry(ROOT_INO, OsStr::new("file.bin")).unwrap();
        assert_eq!(attr.ino, FILE_INO);
        assert_eq!(attr.size, 10 * 1024 * 1024);
        assert_eq!(attr.perm, 0o666);
        assert_eq!(fs.entry(ROOT_INO, OsStr::new(".DS_Store")).unwrap_err(), libc::EPERM);
        assert_eq!(fs.entry(ROOT_INO, OsStr::new("other")).unwrap_err(), libc::ENOENT);
        assert_eq!(fs.entry(FILE_INO, OsStr::new("file.bin")).unwrap_err(), libc::ENOENT);
    }

    #[test]
    fn getattr_paths_by_inode() {
        let fs = urlfs(1);
        assert_eq!(fs.path_of(ROOT_INO).as_deref(), Some("/"));
        assert_eq!(fs.path_of(FILE_INO).as_deref(), Some("/file.bin"));
        assert_eq!(fs.path_of(7), None);
        let root = fs.attr_for("/").unwrap();
        assert_eq!(root.kind, FileType::Directory);
    }

    #[test]
    fn read_dispatch() {
        assert_eq!(read_target(FILE_INO, 4096), Ok(4096));
        assert_eq!(read_target(FILE_INO, -1), Err(libc::EINVAL));
        assert_eq!(read_target(ROOT_INO, 0), Err(libc::EISDIR));
        assert_eq!(read_target(99, 0), Err(libc::ENOENT));
    }

    #[test]
    fn mutations_are_refused() {
        assert_eq!(READ_ONLY_ERRNO, libc::EPERM);
        for op in ["write", "unlink", "rename", "mkdir", "rmdir", "create"] {
            assert_eq!(refuse(op, FILE_INO), libc::EPERM);
        }
    }

    #[test]
    fn async_read_refusal_is_reported() {
        assert!(async_reads_granted::<u64>(Ok(())));
        assert!(!async_reads_granted(Err(1u64)));
    }

    #[test]
    fn read_slot_is_held_by_the_worker() {
        let fs = urlfs(1);
        let gate = fs.reader.gate();
        let permit = gate.acquire();
        assert!(gate.try_acquire().is_none(), "the only slot is taken");
        let reader = Arc::clone(&fs.reader);
        let file = Arc::clone(&fs.file);
        let worker = thread::spawn(move || {
            let mut buf = [0u8; 16];
            // Past the end: answered without a request, permit still released.
            reader.read_with_permit(
                permit,
                Some(&file),
                RangeRequest {
                    offset: file.length,
                    length: 16,
                },
                &mut buf,
            )
        });
        assert_eq!(worker.join().unwrap().unwrap(), 0);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn directory_attr_uses_root_inode() {
        let a = to_file_attr(Attributes {
            kind: EntryKind::Directory,
            perm: attr::ROOT_PERM,
            size: attr::ROOT_SIZE,
            time: SystemTime::now(),
            uid: 1,
            gid: 2,
        });
        assert_eq!(a.ino, ROOT_INO);
        assert_eq!(a.kind, FileType::Directory);
        assert_eq!(a.nlink, 2);
        assert_eq!(a.perm, 0o755);
    }

    #[test]
    fn file_attr_blocks_round_up() {
        let a = to_file_attr(Attributes {
            kind: EntryKind::RegularFile,
            perm: attr::FILE_PERM,
            size: 513,
            time: SystemTime::now(),
            uid: 1,
            gid: 2,
        });
        assert_eq!(a.ino, FILE_INO);
        assert_eq!(a.size, 513);
        assert_eq!(a.blocks, 2);
        assert_eq!((a.uid, a.gid), (1, 2));
    }
}
