//! Next-wake calculation
//!
//! Wake-ups are aligned to multiples of the rotation interval counted from
//! local midnight, so a 1 hour interval always wakes on the hour no matter
//! when the frame was powered on. An optional do-not-disturb window defers
//! any wake that would land inside it to the first aligned instant at or
//! after the window end, or to the window end itself when every aligned
//! instant falls inside the window.
//!
//! ```text
//!   sleep_start            sleep_end (exclusive)
//!        |######################|
//!   ...--+--------+-------------+--------+--...   aligned grid
//!        ^ suppressed           ^ first allowed wake
//! ```

use core::time::Duration;

use thiserror::Error;

use crate::clock::{LocalTime, SECONDS_PER_DAY};

/// Minutes in one day; window boundaries must be below this
pub const MINUTES_PER_DAY: u16 = 1440;

/// Wakes closer than this are pushed out by one interval
pub const DRIFT_GUARD_SECS: u64 = 60;

/// Invalid scheduling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A zero interval would put the device into a wake loop
    #[error("rotation interval must be greater than zero")]
    ZeroInterval,
    /// Window boundary outside of [0, 1440)
    #[error("{field} is {value} minutes, must be below 1440")]
    MinuteOutOfRange { field: &'static str, value: u16 },
}

/// Do-not-disturb window in minutes of day. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepWindow {
    start_minutes: u16,
    end_minutes: u16,
}

impl SleepWindow {
    pub fn new(start_minutes: u16, end_minutes: u16) -> Result<Self, ScheduleError> {
        if start_minutes >= MINUTES_PER_DAY {
            return Err(ScheduleError::MinuteOutOfRange {
                field: "sleep_start",
                value: start_minutes,
            });
        }
        if end_minutes >= MINUTES_PER_DAY {
            return Err(ScheduleError::MinuteOutOfRange {
                field: "sleep_end",
                value: end_minutes,
            });
        }
        Ok(Self {
            start_minutes,
            end_minutes,
        })
    }

    /// e.g. 23:00-07:00
    pub fn crosses_midnight(&self) -> bool {
        self.start_minutes > self.end_minutes
    }

    /// Equal start and end suppresses nothing
    pub fn is_empty(&self) -> bool {
        self.start_minutes == self.end_minutes
    }

    pub fn start_seconds(&self) -> u64 {
        u64::from(self.start_minutes) * 60
    }

    pub fn end_seconds(&self) -> u64 {
        u64::from(self.end_minutes) * 60
    }

    /// Whether a second of day falls inside `[start, end)`, wrapping at midnight
    pub fn contains(&self, second_of_day: u64) -> bool {
        let start = self.start_seconds();
        let end = self.end_seconds();
        if self.crosses_midnight() {
            second_of_day >= start || second_of_day < end
        } else {
            second_of_day >= start && second_of_day < end
        }
    }
}

/// Scheduling inputs for one calculation, read from the config store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub rotation_interval_seconds: u32,
    pub sleep_schedule_enabled: bool,
    pub sleep_start_minutes: u16,
    pub sleep_end_minutes: u16,
}

impl ScheduleConfig {
    /// Interval-only schedule without a sleep window
    pub const fn every(rotation_interval_seconds: u32) -> Self {
        Self {
            rotation_interval_seconds,
            sleep_schedule_enabled: false,
            sleep_start_minutes: 0,
            sleep_end_minutes: 0,
        }
    }

    /// Same interval with the sleep window enabled
    pub const fn with_sleep_window(mut self, start_minutes: u16, end_minutes: u16) -> Self {
        self.sleep_schedule_enabled = true;
        self.sleep_start_minutes = start_minutes;
        self.sleep_end_minutes = end_minutes;
        self
    }

    /// Check every field, returning the effective window if one applies
    pub fn validate(&self) -> Result<Option<SleepWindow>, ScheduleError> {
        if self.rotation_interval_seconds == 0 {
            return Err(ScheduleError::ZeroInterval);
        }
        if !self.sleep_schedule_enabled {
            return Ok(None);
        }
        let window = SleepWindow::new(self.sleep_start_minutes, self.sleep_end_minutes)?;
        Ok((!window.is_empty()).then_some(window))
    }
}

/// Seconds from `now` until the next wake-up.
///
/// Pure: the same inputs always give the same answer. A zero result is
/// possible when the deferred wake coincides with the current second.
pub fn compute_next_wake(config: &ScheduleConfig, now: LocalTime) -> Result<u64, ScheduleError> {
    let window = config.validate()?;
    let interval = u64::from(config.rotation_interval_seconds);
    let current = now.seconds_of_day();

    let next_aligned = (current / interval + 1) * interval;
    let mut seconds_until_next = next_aligned - current;
    if seconds_until_next < DRIFT_GUARD_SECS {
        // Woke a little early relative to the grid; skip the boundary we are sitting on
        seconds_until_next += interval;
    }

    let Some(window) = window else {
        return Ok(seconds_until_next);
    };

    let wake_second_of_day = (current + seconds_until_next) % SECONDS_PER_DAY;
    if !window.contains(wake_second_of_day) {
        return Ok(seconds_until_next);
    }

    let start = window.start_seconds();
    let end = window.end_seconds();
    let aligned = end.div_ceil(interval) * interval;
    // No grid point clears the window (e.g. a 24 h grid at midnight): wake at its end
    let target = if window.contains(aligned % SECONDS_PER_DAY) {
        end
    } else {
        aligned
    };

    let seconds_until_wake = if window.crosses_midnight() {
        if current >= start {
            // Evening part of the window: wake after it ends tomorrow
            (SECONDS_PER_DAY - current) + target
        } else if current < end {
            // Morning part of the window: wake when it ends today
            target - current
        } else {
            // Daytime, but the next wake falls into tonight's window
            (SECONDS_PER_DAY - current) + target
        }
    } else if target >= current {
        target - current
    } else {
        // The window was reached by wrapping past midnight
        (SECONDS_PER_DAY - current) + target
    };

    Ok(seconds_until_wake)
}

/// `compute_next_wake` as a `Duration` for the deep-sleep timer
pub fn next_wake_duration(config: &ScheduleConfig, now: LocalTime) -> Result<Duration, ScheduleError> {
    compute_next_wake(config, now).map(Duration::from_secs)
}

#[cfg(test)]
mod tests;
