//! Expose one remote HTTP file as a local file, fetched lazily by byte range.
//!
//! A [`session::MountSession`] probes the URL, mounts a one-entry read-only
//! FUSE filesystem and links the entry into a directory of the caller's
//! choice. Each kernel read becomes one HTTP range request.

pub mod config;
pub mod error;
pub mod logging;

pub mod attr;
pub mod bridge;
pub mod fs;
mod http;
pub mod probe;
pub mod read;
pub mod request;
pub mod session;
pub mod table;
pub mod url_model;

pub use error::{MountError, ReadError};
pub use request::{Credentials, MountRequest};
pub use session::{MountSession, MountState};
pub use table::RemoteFile;
