#![no_std]

extern crate alloc;

pub mod display;
pub mod epd;
pub mod framebuffer;
pub mod pmu;
pub mod remote;
pub mod sleep_state;
pub mod storage;
pub mod time_sync;

use esp_hal::rng::Rng;
use photoframe_core::RandomSource;

/// Hardware RNG as the image picker's random source
pub struct HardwareRng(pub Rng);

impl RandomSource for HardwareRng {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }
}
