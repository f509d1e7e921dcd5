//! Range-read engine.
//!
//! Every kernel read is answered by one fresh HTTP request carrying
//! `Range: bytes=<offset>-<offset+len-1>`. Nothing is cached or coalesced
//! between calls and there is no readahead. The body is buffered until the
//! requested count (or the shorter slice the server sent) has arrived and is
//! then copied into the caller's buffer.

mod gate;

pub use gate::{ReadGate, ReadPermit};

use std::cell::Cell;
use std::str;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MurlConfig;
use crate::error::ReadError;
use crate::http::{self, content_range_start, is_status_line, split_header};
use crate::request::Credentials;
use crate::table::RemoteFile;

/// One kernel read: `length` bytes starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub offset: u64,
    pub length: u32,
}

impl RangeRequest {
    /// Inclusive end offset; `None` for an empty request.
    pub fn last_byte(&self) -> Option<u64> {
        (self.length > 0).then(|| self.offset + u64::from(self.length) - 1)
    }

    /// Value of the `Range` header, e.g. `bytes=0-4095`.
    pub fn header_value(&self) -> Option<String> {
        self.last_byte()
            .map(|last| format!("bytes={}-{}", self.offset, last))
    }
}

/// Issues ranged GETs against one URL.
#[derive(Debug)]
pub struct RangeReader {
    url: String,
    auth: Option<Credentials>,
    connect_timeout: Duration,
    low_speed_limit: u32,
    low_speed_time: Duration,
    gate: Arc<ReadGate>,
}

impl RangeReader {
    pub fn new(url: &str, auth: Option<Credentials>, cfg: &MurlConfig) -> Self {
        Self {
            url: url.to_string(),
            auth,
            connect_timeout: cfg.connect_timeout(),
            low_speed_limit: cfg.read_low_speed_limit,
            low_speed_time: Duration::from_secs(cfg.read_low_speed_time_secs),
            gate: Arc::new(ReadGate::new(cfg.max_inflight_reads)),
        }
    }

    pub fn gate(&self) -> &Arc<ReadGate> {
        &self.gate
    }

    /// Reads `req` into `buf` and returns the number of bytes written.
    ///
    /// Fewer bytes than requested means the server sent a shorter slice (end
    /// of file); reads at or past the known length return 0 without a request.
    /// Waits for a gate slot only when a request actually goes out.
    pub fn read(
        &self,
        file: Option<&RemoteFile>,
        req: RangeRequest,
        buf: &mut [u8],
    ) -> Result<usize, ReadError> {
        self.read_inner(None, file, req, buf)
    }

    /// Like [`read`](Self::read), with a slot the caller already holds.
    ///
    /// The permit is released when this returns.
    pub fn read_with_permit(
        &self,
        permit: ReadPermit,
        file: Option<&RemoteFile>,
        req: RangeRequest,
        buf: &mut [u8],
    ) -> Result<usize, ReadError> {
        self.read_inner(Some(permit), file, req, buf)
    }

    fn read_inner(
        &self,
        permit: Option<ReadPermit>,
        file: Option<&RemoteFile>,
        req: RangeRequest,
        buf: &mut [u8],
    ) -> Result<usize, ReadError> {
        let file = file.ok_or(ReadError::NoEntity)?;
        let want = buf.len().min(req.length as usize);
        let range = match req.header_value() {
            Some(range) if want > 0 && req.offset < file.length => range,
            _ => return Ok(0),
        };

        let _permit = permit.unwrap_or_else(|| self.gate.acquire());
        let body = self.fetch(req, want)?;
        let n = body.len();
        buf[..n].copy_from_slice(&body);
        tracing::debug!(range = %range, received = n, "range read");
        Ok(n)
    }

    /// Performs the GET and returns at most `want` bytes of body.
    fn fetch(&self, req: RangeRequest, want: usize) -> Result<Vec<u8>, ReadError> {
        let mut body: Vec<u8> = Vec::with_capacity(want);
        let slice_len: Cell<Option<u64>> = Cell::new(None);
        let slice_start: Cell<Option<u64>> = Cell::new(None);

        let mut easy = http::new_easy(&self.url, self.auth.as_ref(), self.connect_timeout)
            .map_err(ReadError::Network)?;
        easy.low_speed_limit(self.low_speed_limit)
            .map_err(ReadError::Network)?;
        easy.low_speed_time(self.low_speed_time)
            .map_err(ReadError::Network)?;
        let last = req.offset + want as u64 - 1;
        easy.range(&format!("{}-{}", req.offset, last))
            .map_err(ReadError::Network)?;

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(line) = str::from_utf8(data) {
                        let line = line.trim_end();
                        if is_status_line(line) {
                            slice_len.set(None);
                            slice_start.set(None);
                        } else if let Some((name, value)) = split_header(line) {
                            match name.as_str() {
                                "content-length" => slice_len.set(value.parse::<u64>().ok()),
                                "content-range" => slice_start.set(content_range_start(value)),
                                _ => {}
                            }
                        }
                    }
                    true
                })
                .map_err(ReadError::Network)?;
            transfer
                .write_function(|data| {
                    let limit = slice_len
                        .get()
                        .map_or(want, |len| want.min(len as usize));
                    let room = limit.saturating_sub(body.len());
                    let take = room.min(data.len());
                    body.extend_from_slice(&data[..take]);
                    // Once the buffer is full, refusing the rest aborts the transfer.
                    Ok(if take < data.len() { 0 } else { data.len() })
                })
                .map_err(ReadError::Network)?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if !e.is_write_error() {
                return Err(ReadError::Network(e));
            }
        }

        let status = easy.response_code().map_err(ReadError::Network)?;
        match status {
            206 => {
                // A slice starting anywhere else would land at the wrong offset.
                if let Some(start) = slice_start.get().filter(|&s| s != req.offset) {
                    tracing::warn!(offset = req.offset, start, "misplaced range response");
                    return Err(ReadError::UnexpectedStatus(status));
                }
            }
            // Full body: only usable when it starts where we asked.
            200 if req.offset == 0 => {}
            416 => return Ok(Vec::new()),
            other => return Err(ReadError::UnexpectedStatus(other)),
        }

        if let Some(len) = slice_len.get() {
            if (body.len() as u64) < len.min(want as u64) {
                tracing::debug!(
                    offset = req.offset,
                    expected = len.min(want as u64),
                    received = body.len(),
                    "short range body"
                );
            }
        }
        Ok(body)
    }
}
