use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Allowed inactivity intervals before an active transform reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutDuration {
    Never,
    Short,
    Medium,
    Long,
}

impl Default for TimeoutDuration {
    fn default() -> Self {
        TimeoutDuration::Medium
    }
}

impl std::fmt::Display for TimeoutDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutDuration::Never => write!(f, "never"),
            other => write!(f, "{}s", other.as_secs()),
        }
    }
}

impl TimeoutDuration {
    pub const ALL: [TimeoutDuration; 4] = [
        TimeoutDuration::Never,
        TimeoutDuration::Short,
        TimeoutDuration::Medium,
        TimeoutDuration::Long,
    ];

    pub fn as_secs(self) -> u64 {
        match self {
            TimeoutDuration::Never => 0,
            TimeoutDuration::Short => 4,
            TimeoutDuration::Medium => 8,
            TimeoutDuration::Long => 12,
        }
    }

    /// Map a stored second count onto one of the allowed values.
    ///
    /// Values outside the allowed set fall back to [`TimeoutDuration::Medium`].
    pub fn from_secs(secs: u64) -> Self {
        match Self::ALL.iter().find(|t| t.as_secs() == secs) {
            Some(t) => *t,
            None => {
                tracing::warn!(secs, "unsupported timeout value; using default");
                TimeoutDuration::default()
            }
        }
    }

    /// `None` when the transform never times out.
    pub fn duration(self) -> Option<Duration> {
        match self {
            TimeoutDuration::Never => None,
            other => Some(Duration::from_secs(other.as_secs())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Whether the reduced-reach mode may be entered at all.
    #[serde(default)]
    pub enabled: bool,
    /// Seconds of inactivity before the mode exits. Must be one of
    /// `0`, `4`, `8` or `12`; other values are treated as `8`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Allow a swipe-up gesture to exit the mode.
    #[serde(default)]
    pub swipe_to_exit: bool,
    /// Exit the mode when the foreground application changes.
    #[serde(default = "default_taps_app_to_exit")]
    pub taps_app_to_exit: bool,
    /// Share of the display height the content is shifted down by.
    #[serde(default = "default_offset_percentage")]
    pub offset_percentage: u8,
    /// When enabled the binary initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional log file. Logs go to stdout when absent.
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_timeout_secs() -> u64 {
    TimeoutDuration::Medium.as_secs()
}

fn default_taps_app_to_exit() -> bool {
    true
}

fn default_offset_percentage() -> u8 {
    40
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: default_timeout_secs(),
            swipe_to_exit: false,
            taps_app_to_exit: default_taps_app_to_exit(),
            offset_percentage: default_offset_percentage(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn timeout(&self) -> TimeoutDuration {
        TimeoutDuration::from_secs(self.timeout_secs)
    }

    pub fn offset_percentage(&self) -> u8 {
        self.offset_percentage.min(100)
    }
}
