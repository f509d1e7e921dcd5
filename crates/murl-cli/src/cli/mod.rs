//! CLI for mount-url.

mod commands;

use anyhow::Result;
use clap::Parser;
use murl_core::config;
use std::path::PathBuf;

use commands::run_mount;

/// Expose a remote HTTP file as a local file, fetched lazily by byte range.
#[derive(Debug, Parser)]
#[command(name = "mount-url", version)]
#[command(about = "Mount a remote HTTP file and link it into a directory", long_about = None)]
pub struct Cli {
    /// Direct HTTP/HTTPS URL of the file. The server must send `Accept-Ranges: bytes`.
    pub url: String,

    /// Directory that receives the symlink (default: current directory).
    pub dir: Option<PathBuf>,

    /// Basic auth credentials as `user:pass`.
    #[arg(long, env = "MOUNT_URL_AUTH", value_name = "USER:PASS", hide_env_values = true)]
    pub auth: Option<String>,
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        run_mount(&cli, &cfg).await
    }
}

#[cfg(test)]
mod tests;
