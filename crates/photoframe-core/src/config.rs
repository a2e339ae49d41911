//! Frame configuration
//!
//! The firmware keeps the configuration as a small JSON document on the SD
//! card. The scheduler and dispatcher only ever read it, through
//! [`ConfigStore`].
//!
//! ```json
//! {
//!   "rotate_interval": 3600,
//!   "auto_rotate": true,
//!   "sleep_schedule": { "enabled": true, "start": 1380, "end": 420 },
//!   "gallery_mode": "remote",
//!   "albums": ["FAMILY", "TRAVEL"],
//!   "remote_url": "https://example.com/frame.png",
//!   "utc_offset_minutes": 60
//! }
//! ```

use heapless::{String, Vec};
use serde::Deserialize;
use thiserror::Error;

use crate::gallery::{AlbumName, GalleryMode, MAX_ALBUMS};
use crate::schedule::{ScheduleConfig, ScheduleError};

/// One hour between rotations
pub const DEFAULT_ROTATE_INTERVAL: u32 = 3600;
/// 23:00
pub const DEFAULT_SLEEP_START: u16 = 23 * 60;
/// 07:00
pub const DEFAULT_SLEEP_END: u16 = 7 * 60;

/// Maximum remote gallery URL length
pub const MAX_URL_LEN: usize = 128;

/// Largest UTC offset in use anywhere (UTC+14:00)
const MAX_UTC_OFFSET_MINUTES: u16 = 14 * 60;

/// Read-only view of the configuration store
pub trait ConfigStore {
    fn sleep_schedule_enabled(&self) -> bool;
    /// Minute of day the do-not-disturb window begins
    fn sleep_schedule_start(&self) -> u16;
    /// Minute of day the window ends (exclusive)
    fn sleep_schedule_end(&self) -> u16;
    fn rotation_interval(&self) -> u32;
    fn auto_rotate(&self) -> bool;
    fn gallery_mode(&self) -> GalleryMode;

    /// Snapshot of the scheduling fields for one calculation
    fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            rotation_interval_seconds: self.rotation_interval(),
            sleep_schedule_enabled: self.sleep_schedule_enabled(),
            sleep_start_minutes: self.sleep_schedule_start(),
            sleep_end_minutes: self.sleep_schedule_end(),
        }
    }
}

/// Config document errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0:?}")]
    Parse(serde_json_core::de::Error),
    #[error("invalid schedule: {0}")]
    Invalid(#[from] ScheduleError),
    #[error("utc offset {0} minutes is out of range")]
    UtcOffset(i16),
}

/// Do-not-disturb section of the config document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SleepScheduleConfig {
    pub enabled: bool,
    pub start: u16,
    pub end: u16,
}

impl Default for SleepScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: DEFAULT_SLEEP_START,
            end: DEFAULT_SLEEP_END,
        }
    }
}

/// Parsed config document. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Seconds between rotations
    pub rotate_interval: u32,
    pub auto_rotate: bool,
    pub sleep_schedule: SleepScheduleConfig,
    pub gallery_mode: GalleryMode,
    /// Enabled album names; `None` enables every album on the card
    pub albums: Option<Vec<AlbumName, MAX_ALBUMS>>,
    /// Overrides the build-time remote gallery URL
    pub remote_url: Option<String<MAX_URL_LEN>>,
    pub utc_offset_minutes: i16,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            rotate_interval: DEFAULT_ROTATE_INTERVAL,
            auto_rotate: true,
            sleep_schedule: SleepScheduleConfig::default(),
            gallery_mode: GalleryMode::Local,
            albums: None,
            remote_url: None,
            utc_offset_minutes: 0,
        }
    }
}

impl FrameConfig {
    /// Parse and validate a config document
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let (config, _) =
            serde_json_core::from_slice::<FrameConfig>(bytes).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the schedule meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Window bounds are checked even while disabled so a bad file is caught early
        ScheduleConfig::every(self.rotate_interval)
            .with_sleep_window(self.sleep_schedule.start, self.sleep_schedule.end)
            .validate()?;

        if self.utc_offset_minutes.unsigned_abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::UtcOffset(self.utc_offset_minutes));
        }
        Ok(())
    }

    /// Whether an album is enabled for local rotation
    pub fn album_enabled(&self, name: &str) -> bool {
        match &self.albums {
            None => true,
            Some(list) => list.iter().any(|a| a.as_str().eq_ignore_ascii_case(name)),
        }
    }
}

impl ConfigStore for FrameConfig {
    fn sleep_schedule_enabled(&self) -> bool {
        self.sleep_schedule.enabled
    }

    fn sleep_schedule_start(&self) -> u16 {
        self.sleep_schedule.start
    }

    fn sleep_schedule_end(&self) -> u16 {
        self.sleep_schedule.end
    }

    fn rotation_interval(&self) -> u32 {
        self.rotate_interval
    }

    fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    fn gallery_mode(&self) -> GalleryMode {
        self.gallery_mode
    }
}
