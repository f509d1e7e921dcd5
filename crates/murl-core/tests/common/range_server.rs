//! Minimal HTTP/1.1 server for integration tests: GET with optional Range.
//!
//! Serves a single static body. Every request's raw header block is recorded
//! so tests can assert on what the client actually sent.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes`.
    pub advertise_ranges: bool,
    /// If false, omit `Content-Length` on full (non-range) responses.
    pub send_length: bool,
    /// Extra `Content-Disposition` value on full responses.
    pub content_disposition: Option<String>,
    /// Answer every request with this status and an empty body.
    pub fixed_status: Option<&'static str>,
    /// Wait this long before answering a request that carries `Range`.
    pub range_delay: Option<Duration>,
    /// Serve each range this many bytes later than asked, and say so in `Content-Range`.
    pub shift_ranges: u64,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            advertise_ranges: true,
            send_length: true,
            content_disposition: None,
            fixed_status: None,
            range_delay: None,
            shift_ranges: 0,
        }
    }
}

/// Running server: base URL plus the log of requests it received.
pub struct RangeServer {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl RangeServer {
    /// `Range` header values received so far, in arrival order.
    pub fn ranges(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|req| header(req, "range").map(str::to_string))
            .collect()
    }

    /// Raw header blocks of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a server for `body` under `path` (e.g. "/file.bin").
pub fn start(body: Vec<u8>, path: &str) -> RangeServer {
    start_with_options(body, path, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, path: &str, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let log = Arc::clone(&log);
            let opts = Arc::clone(&opts);
            thread::spawn(move || handle(stream, &body, &opts, &log));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}{}", port, path),
        requests,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: &RangeServerOptions,
    log: &Mutex<Vec<String>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s.to_string(),
        Err(_) => return,
    };
    log.lock().unwrap().push(request.clone());

    if let Some(status) = opts.fixed_status {
        let _ = write!(stream, "HTTP/1.1 {}\r\nContent-Length: 0\r\n\r\n", status);
        return;
    }

    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };
    let range = header(&request, "range").and_then(parse_range);
    if let (Some(delay), Some(_)) = (opts.range_delay, range) {
        thread::sleep(delay);
    }
    let range = range.map(|(start, end)| {
        (
            start.saturating_add(opts.shift_ranges),
            end.saturating_add(opts.shift_ranges),
        )
    });

    let (status, extra, slice) = match range {
        Some((start, end_incl)) if opts.support_ranges => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start >= total || start > end_incl {
                (
                    "416 Range Not Satisfiable",
                    format!("Content-Range: bytes */{}\r\n", total),
                    &body[0..0],
                )
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content",
                    format!("Content-Range: bytes {}-{}/{}\r\n", start, end_incl, total),
                    slice,
                )
            }
        }
        _ => {
            let disposition = opts
                .content_disposition
                .as_ref()
                .map(|v| format!("Content-Disposition: {}\r\n", v))
                .unwrap_or_default();
            ("200 OK", disposition, body)
        }
    };

    let length = if status.starts_with("200") && !opts.send_length {
        String::new()
    } else {
        format!("Content-Length: {}\r\n", slice.len())
    };
    let head = format!(
        "HTTP/1.1 {}\r\n{}{}{}Connection: close\r\n\r\n",
        status, length, extra, accept_ranges
    );
    let _ = stream.write_all(head.as_bytes());
    // The probe hangs up after the headers; a failed body write is expected then.
    let _ = stream.write_all(slice);
}

fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    request
        .lines()
        .skip(1)
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
}

/// `bytes=X-Y` → (X, Y); `bytes=X-` → (X, u64::MAX).
fn parse_range(value: &str) -> Option<(u64, u64)> {
    let bounds = value.strip_prefix("bytes=")?;
    let (a, b) = bounds.split_once('-')?;
    let start = a.trim().parse().ok()?;
    let end = if b.trim().is_empty() {
        u64::MAX
    } else {
        b.trim().parse().ok()?
    };
    Some((start, end))
}
