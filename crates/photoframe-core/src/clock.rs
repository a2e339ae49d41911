//! Local wall-clock time as seen by the scheduler
//!
//! The frame has no battery-backed calendar chip; the ESP32 RTC counter keeps
//! running through deep sleep and is corrected by SNTP once a day. Timezone
//! handling is a fixed UTC offset taken from the config document.

use core::fmt;

/// Seconds in one civil day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Readings before 2024-01-01T00:00:00Z mean the RTC was never set
pub const MIN_VALID_UNIX: u64 = 1_704_067_200;

/// Maximum age of the last SNTP correction before the clock is resynced
pub const RESYNC_INTERVAL_SECS: u64 = 24 * 3600;

/// A local time of day, with the day number kept for logging and
/// day-boundary arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// Days since 1970-01-01 (local)
    pub day: u32,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl LocalTime {
    /// Build a time of day on day 0. Returns `None` for out-of-range fields.
    pub const fn from_hms(hour: u8, minute: u8, second: u8) -> Option<Self> {
        if hour >= 24 || minute >= 60 || second >= 60 {
            return None;
        }
        Some(Self {
            day: 0,
            hour,
            minute,
            second,
        })
    }

    /// Convert a Unix timestamp to local time using a fixed UTC offset
    pub fn from_unix(unix_secs: u64, utc_offset_minutes: i16) -> Self {
        let day_len = SECONDS_PER_DAY as i64;
        let local = unix_secs as i64 + i64::from(utc_offset_minutes) * 60;
        let day = local.div_euclid(day_len).max(0) as u32;
        let second_of_day = local.rem_euclid(day_len) as u32;

        Self {
            day,
            hour: (second_of_day / 3600) as u8,
            minute: ((second_of_day % 3600) / 60) as u8,
            second: (second_of_day % 60) as u8,
        }
    }

    /// Seconds elapsed since local midnight
    pub const fn seconds_of_day(&self) -> u64 {
        self.hour as u64 * 3600 + self.minute as u64 * 60 + self.second as u64
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Read-only source of the current local time
pub trait WallClock {
    fn now_local(&self) -> LocalTime;
}

/// Clock pinned to a single instant (host tests, bring-up without RTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub LocalTime);

impl WallClock for FixedClock {
    fn now_local(&self) -> LocalTime {
        self.0
    }
}

/// Whether the RTC should be corrected from the network before trusting it
pub fn needs_sync(last_sync_unix: Option<u64>, now_unix: u64) -> bool {
    if now_unix < MIN_VALID_UNIX {
        return true;
    }
    match last_sync_unix {
        None => true,
        // A last-sync in the future means the counter was reset or went backwards
        Some(last) if last > now_unix => true,
        Some(last) => now_unix - last >= RESYNC_INTERVAL_SECS,
    }
}
