//! `mount-url <URL> [DIR]`: mount, link, wait for a signal, tear down.

use anyhow::{Context, Result};
use murl_core::config::MurlConfig;
use murl_core::{MountRequest, MountSession};
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::cli::Cli;

pub async fn run_mount(cli: &Cli, cfg: &MurlConfig) -> Result<()> {
    let request = MountRequest::new(&cli.url, cli.dir.as_deref(), cli.auth.as_deref())?;

    // Installed before anything is mounted: a signal during the mount is held
    // until the session exists and then tears it down.
    let shutdown = ShutdownSignals::install().context("failed to install signal handlers")?;

    let cfg_for_mount = cfg.clone();
    // Probing and mounting block on libcurl and the kernel.
    let session = tokio::task::spawn_blocking(move || {
        MountSession::mount(&request, &cfg_for_mount)
    })
    .await
    .context("mount task panicked")??;

    tracing::info!(
        url = %session.target_url(),
        mount = %session.mount_path().display(),
        link = ?session.symlink_path(),
        "mounted; waiting for SIGINT or SIGTERM"
    );

    let signal = session.serve_until(shutdown.recv()).await;
    tracing::info!("{} handled, mount torn down", signal);
    Ok(())
}

/// SIGINT and SIGTERM listeners, registered up front.
struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}
