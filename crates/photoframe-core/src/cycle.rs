//! End-of-cycle sleep planning

use log::{error, info};

use crate::clock::WallClock;
use crate::config::ConfigStore;
use crate::schedule::compute_next_wake;

/// Sleep used when the schedule cannot be computed, so a bad config never
/// turns into a wake loop
pub const FALLBACK_SLEEP_SECS: u64 = 3600;

/// How the device should go back to sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPlan {
    /// Arm the RTC timer (the button stays armed too)
    Timer { seconds: u64 },
    /// Auto-rotate is off; only the button wakes the device
    UntilButton,
}

impl SleepPlan {
    pub fn timer_seconds(&self) -> Option<u64> {
        match self {
            SleepPlan::Timer { seconds } => Some(*seconds),
            SleepPlan::UntilButton => None,
        }
    }
}

pub fn plan_sleep<C, W>(config: &C, clock: &W) -> SleepPlan
where
    C: ConfigStore + ?Sized,
    W: WallClock + ?Sized,
{
    if !config.auto_rotate() {
        info!("Auto-rotate off, sleeping until button press");
        return SleepPlan::UntilButton;
    }

    let now = clock.now_local();
    match compute_next_wake(&config.schedule(), now) {
        Ok(seconds) => {
            info!("Now {}, next wake in {}s", now, seconds);
            SleepPlan::Timer { seconds }
        }
        Err(e) => {
            error!("Cannot schedule next wake: {}, sleeping {}s", e, FALLBACK_SLEEP_SECS);
            SleepPlan::Timer {
                seconds: FALLBACK_SLEEP_SECS,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, LocalTime};
    use crate::config::FrameConfig;

    fn clock(hour: u8, minute: u8, second: u8) -> FixedClock {
        FixedClock(LocalTime::from_hms(hour, minute, second).unwrap())
    }

    #[test]
    fn test_timer_plan_uses_schedule() {
        let config = FrameConfig::from_json(
            br#"{"sleep_schedule": {"enabled": true, "start": 1380, "end": 420}}"#,
        )
        .unwrap();
        assert_eq!(
            plan_sleep(&config, &clock(22, 30, 0)),
            SleepPlan::Timer { seconds: 30_600 }
        );
        assert_eq!(
            plan_sleep(&config, &clock(10, 30, 0)),
            SleepPlan::Timer { seconds: 1800 }
        );
    }

    #[test]
    fn test_auto_rotate_off_waits_for_button() {
        let config = FrameConfig {
            auto_rotate: false,
            ..FrameConfig::default()
        };
        let plan = plan_sleep(&config, &clock(10, 30, 0));
        assert_eq!(plan, SleepPlan::UntilButton);
        assert_eq!(plan.timer_seconds(), None);
    }

    #[test]
    fn test_invalid_schedule_uses_fallback() {
        let config = FrameConfig {
            rotate_interval: 0,
            ..FrameConfig::default()
        };
        let plan = plan_sleep(&config, &clock(10, 30, 0));
        assert_eq!(plan.timer_seconds(), Some(FALLBACK_SLEEP_SECS));
    }
}
