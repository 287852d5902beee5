//! Monitor configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub usb: UsbSettings,
    #[serde(default)]
    pub presenter: PresenterSettings,
}

/// Poller and logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "MonitorSettings::default_log_level")]
    pub log_level: String,
    /// Delay between two reads of the tracked device
    #[serde(default = "MonitorSettings::default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Upper bound on a single wait for a device while idle
    #[serde(default = "MonitorSettings::default_idle_wait")]
    pub idle_wait_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            poll_interval_ms: Self::default_poll_interval(),
            idle_wait_ms: Self::default_idle_wait(),
        }
    }
}

impl MonitorSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_poll_interval() -> u64 {
        10
    }

    fn default_idle_wait() -> u64 {
        250
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

/// USB access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSettings {
    /// Timeout of a single knob state transfer
    #[serde(default = "UsbSettings::default_transfer_timeout")]
    pub transfer_timeout_ms: u64,
    /// Enumeration interval when libusb has no hot-plug support
    #[serde(default = "UsbSettings::default_rescan_interval")]
    pub rescan_interval_ms: u64,
    /// Rescan even when hot-plug is supported
    #[serde(default)]
    pub force_rescan: bool,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            transfer_timeout_ms: Self::default_transfer_timeout(),
            rescan_interval_ms: Self::default_rescan_interval(),
            force_rescan: false,
        }
    }
}

impl UsbSettings {
    const MAX_TRANSFER_TIMEOUT_MS: u64 = 10_000;

    fn default_transfer_timeout() -> u64 {
        500
    }

    fn default_rescan_interval() -> u64 {
        1000
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }
}

/// Console presenter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenterSettings {
    /// Decimal places of the reported button hold duration
    #[serde(default = "PresenterSettings::default_precision")]
    pub precision: u32,
    /// Switch to a newly connected PowerMate even when one is already tracked
    #[serde(default = "PresenterSettings::default_replace_on_connect")]
    pub replace_on_connect: bool,
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self {
            precision: Self::default_precision(),
            replace_on_connect: Self::default_replace_on_connect(),
        }
    }
}

impl PresenterSettings {
    const MAX_PRECISION: u32 = 9;

    fn default_precision() -> u32 {
        2
    }

    fn default_replace_on_connect() -> bool {
        true
    }
}

impl MonitorConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref())
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/powermate-monitor/monitor.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("powermate-monitor").join("monitor.toml")
        } else {
            PathBuf::from(".config/powermate-monitor/monitor.toml")
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        Self::validate_log_level(&self.monitor.log_level)?;

        if self.usb.transfer_timeout_ms == 0
            || self.usb.transfer_timeout_ms > UsbSettings::MAX_TRANSFER_TIMEOUT_MS
        {
            return Err(anyhow!(
                "Invalid transfer_timeout_ms {}, must be between 1 and {}",
                self.usb.transfer_timeout_ms,
                UsbSettings::MAX_TRANSFER_TIMEOUT_MS
            ));
        }

        if self.usb.rescan_interval_ms == 0 {
            return Err(anyhow!("rescan_interval_ms must be greater than 0"));
        }

        if self.monitor.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be greater than 0"));
        }

        if self.monitor.idle_wait_ms == 0 {
            return Err(anyhow!("idle_wait_ms must be greater than 0"));
        }

        if self.presenter.precision > PresenterSettings::MAX_PRECISION {
            return Err(anyhow!(
                "Invalid precision {}, must be at most {}",
                self.presenter.precision,
                PresenterSettings::MAX_PRECISION
            ));
        }

        Ok(())
    }

    /// Validate a log level name
    pub fn validate_log_level(level: &str) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}
