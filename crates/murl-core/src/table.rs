//! The single-entry file table: one root directory, one remote file.

use std::collections::HashMap;

use crate::probe::Probe;

/// Remote file as seen through the mount. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Size reported to the kernel.
    pub length: u64,
    /// Name of the only entry under the mount root.
    pub display_name: String,
    /// Headers of the probe response.
    pub source_headers: HashMap<String, String>,
}

impl RemoteFile {
    /// Builds the file from a successful probe.
    ///
    /// `default_length` stands in when the server sent no usable length; it is
    /// never revised afterwards.
    pub fn from_probe(probe: Probe, default_length: u64) -> Self {
        let length = probe.content_length().unwrap_or(default_length);
        Self {
            length,
            display_name: probe.display_name,
            source_headers: probe.headers,
        }
    }

    /// Names listed under the mount root. Always exactly one.
    pub fn root_entries(&self) -> [&str; 1] {
        [self.display_name.as_str()]
    }

    /// Absolute path of the entry inside the mount (`/<name>`).
    pub fn entry_path(&self) -> String {
        format!("/{}", self.display_name)
    }
}
