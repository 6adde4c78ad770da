//! Daemon configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file
//! (or no file at all) yields a runnable daemon. Per-metric sysfs paths
//! default to `None`, which turns the corresponding collector into a
//! no-op; device integrations fill in the paths their kernel exposes.

use ks_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::uevent::DEFAULT_TYPEC_PARTNER_PREFIX;

const DEFAULT_SETTLE_SECS: u64 = 30;
const DEFAULT_ZRAM_MM_STAT: &str = "/sys/block/zram0/mm_stat";
const DEFAULT_ZRAM_BD_STAT: &str = "/sys/block/zram0/bd_stat";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Seconds to wait at startup before the first collection pass.
    pub settle_secs: u64,

    /// Filesystem prefix prepended to every sysfs path. Production uses
    /// `/`; tests point this at a scratch tree.
    pub sysfs_root: PathBuf,

    pub paths: SysfsPaths,

    pub uevent: UeventConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            settle_secs: DEFAULT_SETTLE_SECS,
            sysfs_root: PathBuf::from("/"),
            paths: SysfsPaths::default(),
            uevent: UeventConfig::default(),
        }
    }
}

/// Per-metric sysfs node paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SysfsPaths {
    pub slowio_read_cnt: Option<String>,
    pub slowio_write_cnt: Option<String>,
    pub slowio_unmap_cnt: Option<String>,
    pub slowio_sync_cnt: Option<String>,

    pub codec_state: Option<String>,
    pub codec1_state: Option<String>,
    pub speaker_impedance: Option<String>,

    pub cycle_count_bins: Option<String>,

    pub zram_mm_stat: String,
    pub zram_bd_stat: String,

    pub resume_latency_metrics: Option<String>,

    pub long_irq_metrics: Option<String>,
    pub storm_irq_metrics: Option<String>,
    pub irq_stats_reset: Option<String>,

    pub f2fs_mounted_time: Option<String>,
}

impl Default for SysfsPaths {
    fn default() -> Self {
        Self {
            slowio_read_cnt: None,
            slowio_write_cnt: None,
            slowio_unmap_cnt: None,
            slowio_sync_cnt: None,
            codec_state: None,
            codec1_state: None,
            speaker_impedance: None,
            cycle_count_bins: None,
            zram_mm_stat: DEFAULT_ZRAM_MM_STAT.to_string(),
            zram_bd_stat: DEFAULT_ZRAM_BD_STAT.to_string(),
            resume_latency_metrics: None,
            long_irq_metrics: None,
            storm_irq_metrics: None,
            irq_stats_reset: None,
            f2fs_mounted_time: None,
        }
    }
}

/// Uevent handler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UeventConfig {
    /// DEVPATH the audio driver reports microphone state on.
    pub audio_devpath: Option<String>,

    /// Sysfs directory of the USB overheat mitigation driver.
    pub usb_overheat_dir: Option<String>,

    /// Sysfs nodes holding the Type-C partner vendor and product ids.
    /// Both must be set to enable the partner handler.
    pub typec_vid_path: Option<String>,
    pub typec_pid_path: Option<String>,

    /// Record prefix announcing a Type-C partner power supply.
    pub typec_partner_prefix: String,
}

impl Default for UeventConfig {
    fn default() -> Self {
        Self {
            audio_devpath: None,
            usb_overheat_dir: None,
            typec_vid_path: None,
            typec_pid_path: None,
            typec_partner_prefix: DEFAULT_TYPEC_PARTNER_PREFIX.to_string(),
        }
    }
}

impl DaemonConfig {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }
}
