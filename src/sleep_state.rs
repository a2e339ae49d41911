//! State kept in RTC fast memory across deep sleep
//!
//! Lost on power-on or reset; the magic number tells a resumed cycle from a
//! cold boot.

use photoframe_core::GalleryMode;

/// Magic number to validate RTC memory state
const SLEEP_STATE_MAGIC: u32 = 0x5EED_F4A3;

#[repr(C)]
struct SleepState {
    magic: u32,
    /// Unix time of the last successful SNTP correction, 0 if never
    last_sync_unix: u64,
    /// Gallery mode of the previous cycle
    gallery_mode: u8,
}

impl SleepState {
    const fn new() -> Self {
        Self {
            magic: 0,
            last_sync_unix: 0,
            gallery_mode: 0,
        }
    }
}

#[esp_hal::ram(unstable(rtc_fast))]
static mut SLEEP_STATE: SleepState = SleepState::new();

/// What the previous cycle left behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resumed {
    pub last_sync_unix: Option<u64>,
    /// Decides whether an old remote image survives a mode switch
    pub gallery_mode: GalleryMode,
}

/// Read the saved state, `None` after a cold boot
pub fn load() -> Option<Resumed> {
    // SAFETY: single-core access before any task touching the state is spawned
    let state = unsafe { &*(&raw const SLEEP_STATE) };
    if state.magic != SLEEP_STATE_MAGIC {
        return None;
    }
    Some(Resumed {
        last_sync_unix: (state.last_sync_unix != 0).then_some(state.last_sync_unix),
        gallery_mode: GalleryMode::from_u8(state.gallery_mode),
    })
}

/// Save state for the next wake
pub fn save(resumed: &Resumed) {
    // SAFETY: called once, right before deep sleep
    let state = unsafe { &mut *(&raw mut SLEEP_STATE) };
    state.magic = SLEEP_STATE_MAGIC;
    state.last_sync_unix = resumed.last_sync_unix.unwrap_or(0);
    state.gallery_mode = resumed.gallery_mode as u8;
}
