//! Wake scheduling and image rotation for the e-paper photo frame.
//!
//! Everything in this crate is hardware independent so it can be exercised
//! on the host. The firmware supplies the collaborators (SD card library,
//! panel, RTC clock) through the traits defined here.

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod config;
pub mod cycle;
pub mod dispatch;
pub mod gallery;
pub mod schedule;
pub mod sntp;

#[cfg(test)]
mod mock;

pub use clock::{LocalTime, WallClock, needs_sync};
pub use config::{ConfigStore, FrameConfig};
pub use cycle::{SleepPlan, plan_sleep};
pub use dispatch::{
    DispatchError, DispatchOutcome, FrameDisplay, RotationDispatcher, SkipReason, WakeContext,
    WakeReason,
};
pub use gallery::{
    GalleryMode, ImageLibrary, ImageSource, RandomSource, XorShift32, keep_stale_remote,
};
pub use schedule::{ScheduleConfig, ScheduleError, compute_next_wake};
