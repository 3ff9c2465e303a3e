//! Configuration management.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Size of one probe heartbeat, used for capacity gating.
pub const DEFAULT_PROBE_SIZE_BYTES: u32 = 10;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Association configuration.
    #[serde(default)]
    pub association: AssociationConfig,

    /// Active probing configuration (applies to every path).
    #[serde(default)]
    pub probing: ProbingConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.probing.validate()?;

        if self.association.max_paths == 0 {
            return Err(Error::InvalidConfig("max_paths must be at least 1".into()));
        }

        if self.association.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            probing: ProbingConfig {
                period: Duration::from_secs(1),
                give_up_timeout: Duration::from_secs(5),
                burst_limit: Some(3),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Association configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Maximum number of destination paths.
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,

    /// Congestion window assigned to new paths, in bytes.
    #[serde(default = "default_initial_cwnd")]
    pub initial_cwnd: u32,

    /// Capacity of the upper-layer event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_paths() -> usize {
    16
}
fn default_initial_cwnd() -> u32 {
    4380
}
fn default_event_capacity() -> usize {
    256
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            max_paths: default_max_paths(),
            initial_cwnd: default_initial_cwnd(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Active probing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbingConfig {
    /// Enable active probing. Fixed for the lifetime of each session.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interval between probes of one burst.
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,

    /// Time to wait for an acknowledgment before failing the path over.
    #[serde(default = "default_give_up", with = "humantime_serde")]
    pub give_up_timeout: Duration,

    /// Probes per activation. Derived from `give_up_timeout / period` when unset.
    #[serde(default)]
    pub burst_limit: Option<u32>,

    /// Bytes one probe consumes from the congestion window.
    #[serde(default = "default_probe_size")]
    pub probe_size_bytes: u32,

    /// Refuse activation when the congestion window cannot absorb a full burst.
    #[serde(default = "default_capacity_gating")]
    pub capacity_gating: bool,

    /// Re-route stranded chunks and flush data after a give-up.
    #[serde(default = "default_reroute")]
    pub reroute_on_give_up: bool,
}

fn default_enabled() -> bool {
    true
}
fn default_period() -> Duration {
    Duration::from_secs(1)
}
fn default_give_up() -> Duration {
    Duration::from_secs(5)
}
fn default_probe_size() -> u32 {
    DEFAULT_PROBE_SIZE_BYTES
}
fn default_capacity_gating() -> bool {
    true
}
fn default_reroute() -> bool {
    true
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            period: default_period(),
            give_up_timeout: default_give_up(),
            burst_limit: None,
            probe_size_bytes: default_probe_size(),
            capacity_gating: default_capacity_gating(),
            reroute_on_give_up: default_reroute(),
        }
    }
}

impl ProbingConfig {
    /// Configuration with probing switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Number of probes sent per activation.
    ///
    /// An explicit limit wins; otherwise as many periods as fit in the
    /// give-up timeout. Never fewer than one, since activation always sends
    /// the first probe.
    pub fn effective_burst_limit(&self) -> u32 {
        if let Some(limit) = self.burst_limit {
            return limit.max(1);
        }
        if self.period.is_zero() {
            return 1;
        }
        let periods = self.give_up_timeout.as_nanos() / self.period.as_nanos();
        u32::try_from(periods).unwrap_or(u32::MAX).max(1)
    }

    /// Bytes a full burst would take out of the congestion window.
    pub fn burst_bytes(&self) -> u64 {
        u64::from(self.effective_burst_limit()) * u64::from(self.probe_size_bytes)
    }

    /// Validate probing parameters.
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(Error::InvalidConfig("probing period must be non-zero".into()));
        }

        if self.give_up_timeout < self.period {
            return Err(Error::InvalidConfig(format!(
                "give_up_timeout ({:?}) shorter than period ({:?})",
                self.give_up_timeout, self.period
            )));
        }

        if self.burst_limit == Some(0) {
            return Err(Error::InvalidConfig("burst_limit must be at least 1".into()));
        }

        if self.probe_size_bytes == 0 {
            return Err(Error::InvalidConfig(
                "probe_size_bytes must be non-zero".into(),
            ));
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color).with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
