use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration loaded from `~/.config/mount-url/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MurlConfig {
    /// Connect timeout in seconds for every outbound request.
    pub connect_timeout_secs: u64,
    /// Wall-clock limit in seconds for the initial probe.
    pub probe_timeout_secs: u64,
    /// Abort a ranged read if throughput stays below this many bytes/sec...
    pub read_low_speed_limit: u32,
    /// ...for this many seconds.
    pub read_low_speed_time_secs: u64,
    /// Maximum number of ranged fetches in flight at once.
    pub max_inflight_reads: usize,
    /// How long the kernel may cache attributes and entries, in seconds.
    pub attr_ttl_secs: u64,
    /// File size reported when the server sends no Content-Length.
    pub default_length: u64,
    /// Ask the kernel to unmount if the process dies without tearing down.
    #[serde(default)]
    pub auto_unmount: bool,
}

impl Default for MurlConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            probe_timeout_secs: 30,
            read_low_speed_limit: 1024,
            read_low_speed_time_secs: 60,
            max_inflight_reads: 16,
            attr_ttl_secs: 1,
            default_length: 4096,
            auto_unmount: false,
        }
    }
}

impl MurlConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_ttl_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mount-url")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MurlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MurlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)
            .with_context(|| format!("failed to write default config {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MurlConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
