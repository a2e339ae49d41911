use proptest::prelude::*;

use super::*;

const HOUR: u32 = 3600;

fn at(hour: u8, minute: u8, second: u8) -> LocalTime {
    LocalTime::from_hms(hour, minute, second).unwrap()
}

fn overnight(interval: u32) -> ScheduleConfig {
    // 23:00 - 07:00
    ScheduleConfig::every(interval).with_sleep_window(1380, 420)
}

fn wake(config: &ScheduleConfig, now: LocalTime) -> u64 {
    compute_next_wake(config, now).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Plain interval alignment
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_hourly_without_schedule() {
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(10, 30, 0)), 1800);
}

#[test]
fn test_half_hour_interval() {
    assert_eq!(wake(&ScheduleConfig::every(1800), at(10, 15, 0)), 900);
}

#[test]
fn test_quarter_hour_interval() {
    assert_eq!(wake(&ScheduleConfig::every(900), at(10, 7, 0)), 480);
}

#[test]
fn test_boundary_at_midnight() {
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(23, 30, 0)), 1800);
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(0, 0, 0)), 3600);
}

#[test]
fn test_interval_longer_than_a_day() {
    assert_eq!(wake(&ScheduleConfig::every(90_000), at(0, 0, 0)), 90_000);
    assert_eq!(wake(&ScheduleConfig::every(90_000), at(12, 0, 0)), 90_000 - 43_200);
}

// ─────────────────────────────────────────────────────────────────────────────
// Drift guard
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_drift_40_seconds_early_skips_boundary() {
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(16, 59, 20)), 3640);
}

#[test]
fn test_drift_59_seconds_early_skips_boundary() {
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(16, 59, 1)), 3659);
}

#[test]
fn test_drift_exactly_60_seconds_is_kept() {
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(16, 59, 0)), 60);
}

#[test]
fn test_drift_61_seconds_is_kept() {
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(16, 58, 59)), 61);
}

#[test]
fn test_drift_just_before_midnight() {
    assert_eq!(wake(&ScheduleConfig::every(HOUR), at(23, 59, 30)), 3630);
}

// ─────────────────────────────────────────────────────────────────────────────
// Overnight window
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_overnight_wake_outside_window() {
    assert_eq!(wake(&overnight(HOUR), at(18, 0, 0)), 3600);
}

#[test]
fn test_overnight_evening_skips_to_morning() {
    // 22:30 -> 07:00 next day
    assert_eq!(wake(&overnight(HOUR), at(22, 30, 0)), 30_600);
}

#[test]
fn test_overnight_currently_inside_after_midnight() {
    // 02:00 -> 07:00
    assert_eq!(wake(&overnight(HOUR), at(2, 0, 0)), 18_000);
}

#[test]
fn test_overnight_currently_inside_before_midnight() {
    // 23:30 -> 07:00 next day
    assert_eq!(wake(&overnight(HOUR), at(23, 30, 0)), 27_000);
}

#[test]
fn test_overnight_at_midnight() {
    assert_eq!(wake(&overnight(HOUR), at(0, 0, 0)), 25_200);
}

#[test]
fn test_wake_exactly_at_window_end_is_allowed() {
    assert_eq!(wake(&overnight(HOUR), at(6, 0, 0)), 3600);
    assert_eq!(wake(&overnight(HOUR), at(6, 30, 0)), 1800);
}

#[test]
fn test_overnight_end_not_on_grid() {
    // 23:00 - 07:15 with a 2 hour grid: first aligned wake at or after 07:15 is 08:00
    let config = ScheduleConfig::every(2 * HOUR).with_sleep_window(1380, 435);
    assert_eq!(wake(&config, at(22, 0, 0)), 36_000);
}

#[test]
fn test_overnight_drift_into_window() {
    // 30s before 23:00 is below the drift guard, so the candidate is 00:00, inside
    assert_eq!(wake(&overnight(HOUR), at(22, 59, 30)), 28_830);
}

#[test]
fn test_interval_not_dividing_the_hour() {
    // Grid of 7000s: the first point at or after 07:00 (25200) is 28000 (07:46:40)
    let config = ScheduleConfig::every(7000).with_sleep_window(1380, 420);
    assert_eq!(wake(&config, at(1, 0, 0)), 28_000 - 3600);
}

// ─────────────────────────────────────────────────────────────────────────────
// Same-day window
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_same_day_window_skips_to_end() {
    // 12:00 - 14:00, 11:30 -> 14:00
    let config = ScheduleConfig::every(HOUR).with_sleep_window(720, 840);
    assert_eq!(wake(&config, at(11, 30, 0)), 9000);
}

#[test]
fn test_same_day_window_not_reached() {
    let config = ScheduleConfig::every(HOUR).with_sleep_window(720, 840);
    assert_eq!(wake(&config, at(9, 30, 0)), 1800);
    assert_eq!(wake(&config, at(14, 0, 0)), 3600);
}

#[test]
fn test_interval_longer_than_window() {
    // 12:00 - 13:00 on a 2 hour grid: 12:00 is suppressed, next allowed is 14:00
    let config = ScheduleConfig::every(2 * HOUR).with_sleep_window(720, 780);
    assert_eq!(wake(&config, at(11, 0, 0)), 10_800);
}

#[test]
fn test_same_day_window_reached_across_midnight() {
    // 00:00 - 06:00, 23:30 -> 06:00 next day
    let config = ScheduleConfig::every(HOUR).with_sleep_window(0, 360);
    assert_eq!(wake(&config, at(23, 30, 0)), 23_400);
}

#[test]
fn test_deferred_wake_can_be_now() {
    // 12 hour grid, 00:00 - 06:00 window: at 12:00 the first aligned instant after
    // the window end is the current second
    let config = ScheduleConfig::every(12 * HOUR).with_sleep_window(0, 360);
    assert_eq!(wake(&config, at(12, 0, 0)), 0);
}

#[test]
fn test_window_covering_whole_grid_wakes_at_window_end() {
    // 12 hour grid, 23:00 - 13:00: both 00:00 and 12:00 are inside the window
    let config = ScheduleConfig::every(12 * HOUR).with_sleep_window(1380, 780);
    assert_eq!(wake(&config, at(14, 0, 0)), 82_800);
    assert_eq!(wake(&config, at(23, 30, 0)), 48_600);
    assert_eq!(wake(&config, at(6, 0, 0)), 25_200);

    // Daily grid at midnight, 23:00 - 07:00
    let config = overnight(24 * HOUR);
    assert_eq!(wake(&config, at(12, 0, 0)), 68_400);
}

#[test]
fn test_window_covering_whole_grid_never_lands_inside() {
    for config in [
        ScheduleConfig::every(12 * HOUR).with_sleep_window(1380, 780),
        overnight(24 * HOUR),
        ScheduleConfig::every(24 * HOUR).with_sleep_window(0, 300),
    ] {
        let window = config.validate().unwrap().unwrap();
        for second in (0..SECONDS_PER_DAY).step_by(60) {
            let seconds = wake(&config, LocalTime::from_unix(second, 0));
            let landing = (second + seconds) % SECONDS_PER_DAY;
            assert!(!window.contains(landing), "second={} landing={}", second, landing);
            assert!(seconds <= SECONDS_PER_DAY + u64::from(24 * HOUR));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration edge cases
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_disabled_window_is_ignored() {
    let mut config = overnight(HOUR);
    config.sleep_schedule_enabled = false;
    assert_eq!(wake(&config, at(22, 30, 0)), 1800);
}

#[test]
fn test_equal_start_and_end_is_no_window() {
    let config = ScheduleConfig::every(HOUR).with_sleep_window(720, 720);
    assert_eq!(wake(&config, at(11, 30, 0)), 1800);
    assert_eq!(wake(&config, at(12, 0, 0)), 3600);
}

#[test]
fn test_zero_interval_is_rejected() {
    assert_eq!(
        compute_next_wake(&ScheduleConfig::every(0), at(10, 0, 0)),
        Err(ScheduleError::ZeroInterval)
    );
    assert_eq!(
        compute_next_wake(&overnight(0), at(10, 0, 0)),
        Err(ScheduleError::ZeroInterval)
    );
}

#[test]
fn test_window_minutes_out_of_range() {
    let config = ScheduleConfig::every(HOUR).with_sleep_window(1440, 420);
    assert_eq!(
        compute_next_wake(&config, at(10, 0, 0)),
        Err(ScheduleError::MinuteOutOfRange {
            field: "sleep_start",
            value: 1440
        })
    );

    let config = ScheduleConfig::every(HOUR).with_sleep_window(60, 2000);
    assert!(matches!(
        compute_next_wake(&config, at(10, 0, 0)),
        Err(ScheduleError::MinuteOutOfRange { field: "sleep_end", .. })
    ));
}

#[test]
fn test_out_of_range_minutes_ignored_when_disabled() {
    let mut config = ScheduleConfig::every(HOUR).with_sleep_window(5000, 5000);
    config.sleep_schedule_enabled = false;
    assert_eq!(wake(&config, at(10, 30, 0)), 1800);
}

#[test]
fn test_duration_matches_seconds() {
    let d = next_wake_duration(&overnight(HOUR), at(2, 0, 0)).unwrap();
    assert_eq!(d.as_secs(), 18_000);
}

#[test]
fn test_every_second_of_day_avoids_overnight_window() {
    let config = overnight(HOUR);
    let window = config.validate().unwrap().unwrap();
    for second in 0..SECONDS_PER_DAY as u32 {
        let now = LocalTime::from_unix(u64::from(second), 0);
        let seconds = wake(&config, now);
        let landing = (u64::from(second) + seconds) % SECONDS_PER_DAY;
        assert!(!window.contains(landing), "now={} landing={}", now, landing);
        assert_eq!(landing % u64::from(HOUR), 0, "now={}", now);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn prop_disabled_schedule_lands_on_grid(
        interval in 1u32..=2 * 86_400,
        second in 0u64..SECONDS_PER_DAY,
    ) {
        let now = LocalTime::from_unix(second, 0);
        let seconds = wake(&ScheduleConfig::every(interval), now);
        let interval = u64::from(interval);

        prop_assert!(seconds > 0);
        prop_assert_eq!((second + seconds) % interval, 0);
        prop_assert!(seconds >= DRIFT_GUARD_SECS || interval < DRIFT_GUARD_SECS);
        prop_assert!(seconds < interval + DRIFT_GUARD_SECS);
    }

    #[test]
    fn prop_overnight_window_is_never_hit(
        interval in 60u32..=43_200,
        start in 1u16..MINUTES_PER_DAY,
        end in 0u16..MINUTES_PER_DAY,
        second in 0u64..SECONDS_PER_DAY,
    ) {
        prop_assume!(start > end);
        let config = ScheduleConfig::every(interval).with_sleep_window(start, end);
        let window = config.validate().unwrap().unwrap();

        let seconds = wake(&config, LocalTime::from_unix(second, 0));
        prop_assert!(!window.contains((second + seconds) % SECONDS_PER_DAY));
    }

    #[test]
    fn prop_same_day_window_is_never_hit(
        interval in 60u32..=43_200,
        start in 0u16..MINUTES_PER_DAY,
        end in 1u16..MINUTES_PER_DAY,
        second in 0u64..SECONDS_PER_DAY,
    ) {
        prop_assume!(start < end);
        let config = ScheduleConfig::every(interval).with_sleep_window(start, end);
        let window = config.validate().unwrap().unwrap();

        let seconds = wake(&config, LocalTime::from_unix(second, 0));
        prop_assert!(!window.contains((second + seconds) % SECONDS_PER_DAY));
    }

    #[test]
    fn prop_calculation_is_repeatable(
        interval in 1u32..=86_400,
        start in 0u16..MINUTES_PER_DAY,
        end in 0u16..MINUTES_PER_DAY,
        second in 0u64..SECONDS_PER_DAY,
    ) {
        let config = ScheduleConfig::every(interval).with_sleep_window(start, end);
        let now = LocalTime::from_unix(second, 0);
        prop_assert_eq!(compute_next_wake(&config, now), compute_next_wake(&config, now));
    }
}
