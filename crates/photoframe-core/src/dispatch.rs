//! Rotation dispatcher
//!
//! Runs at most one image update per wake event. The `busy` flag is the only
//! state shared across wake signals: a wake that arrives while an update is in
//! flight is dropped, never queued, and the flag is released on every exit
//! path by [`BusyGuard`].

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use thiserror::Error;

use crate::gallery::{
    GalleryMode, ImageLibrary, ImageSource, RandomSource, SelectError, select_source,
};

/// What woke the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Deep-sleep timer expired
    Timer,
    /// KEY button pressed
    Button,
    /// Cold boot or reset
    PowerOn,
}

/// The panel as seen by the dispatcher
pub trait FrameDisplay {
    type Error: fmt::Debug;

    /// Whether the panel is still refreshing
    fn is_busy(&mut self) -> bool;

    /// Decode and show an encoded image
    fn render(&mut self, image: &[u8]) -> Result<(), Self::Error>;
}

/// Why a wake event did not render anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another update is in flight
    AlreadyDispatching,
    /// The panel has not finished its previous refresh
    DisplayBusy,
    /// Timer wake while auto-rotate is off
    AutoRotateDisabled,
}

/// Result of a wake event that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Rendered { source: ImageSource, fell_back: bool },
    Skipped(SkipReason),
}

#[derive(Debug, Error)]
pub enum DispatchError<L: fmt::Debug, D: fmt::Debug> {
    #[error("no enabled album contains an image")]
    NoEnabledAlbums,
    #[error("image library error: {0:?}")]
    Library(L),
    #[error("display error: {0:?}")]
    Render(D),
}

impl<L: fmt::Debug, D: fmt::Debug> From<SelectError<L>> for DispatchError<L, D> {
    fn from(err: SelectError<L>) -> Self {
        match err {
            SelectError::NoEnabledAlbums => DispatchError::NoEnabledAlbums,
            SelectError::Library(e) => DispatchError::Library(e),
        }
    }
}

/// Collaborators used by one wake cycle
pub struct WakeContext<'a, L, D, R> {
    pub library: &'a mut L,
    pub display: &'a mut D,
    pub rng: &'a mut R,
    /// Scratch space for the encoded image
    pub buffer: &'a mut [u8],
}

/// Holds the busy flag for the lifetime of one dispatch
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct RotationDispatcher {
    busy: AtomicBool,
    auto_rotate: AtomicBool,
}

impl RotationDispatcher {
    pub const fn new(auto_rotate: bool) -> Self {
        Self {
            busy: AtomicBool::new(false),
            auto_rotate: AtomicBool::new(auto_rotate),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate.load(Ordering::Relaxed)
    }

    pub fn set_auto_rotate(&self, enabled: bool) {
        self.auto_rotate.store(enabled, Ordering::Relaxed);
    }

    /// Claim the busy flag, or `None` if an update is already in flight
    pub fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BusyGuard { flag: &self.busy })
    }

    /// Run one update cycle for a wake event
    pub fn handle_wakeup<L, D, R>(
        &self,
        reason: WakeReason,
        gallery_mode: GalleryMode,
        ctx: &mut WakeContext<'_, L, D, R>,
    ) -> Result<DispatchOutcome, DispatchError<L::Error, D::Error>>
    where
        L: ImageLibrary,
        D: FrameDisplay,
        R: RandomSource,
    {
        let Some(_guard) = self.try_begin() else {
            warn!("Wake ({:?}) ignored, update already in progress", reason);
            return Ok(DispatchOutcome::Skipped(SkipReason::AlreadyDispatching));
        };

        if reason == WakeReason::Timer && !self.auto_rotate() {
            info!("Auto-rotate disabled, nothing to do on timer wake");
            return Ok(DispatchOutcome::Skipped(SkipReason::AutoRotateDisabled));
        }

        if ctx.display.is_busy() {
            warn!("Display still busy, skipping this cycle");
            return Ok(DispatchOutcome::Skipped(SkipReason::DisplayBusy));
        }

        let selection = select_source(gallery_mode, ctx.library, ctx.rng)?;
        info!(
            "Showing {} (mode {}, wake {:?})",
            selection.source,
            gallery_mode.as_str(),
            reason
        );

        let len = ctx
            .library
            .load(&selection.source, ctx.buffer)
            .map_err(DispatchError::Library)?;

        ctx.display
            .render(&ctx.buffer[..len])
            .map_err(DispatchError::Render)?;

        Ok(DispatchOutcome::Rendered {
            source: selection.source,
            fell_back: selection.fell_back,
        })
    }
}

impl Default for RotationDispatcher {
    fn default() -> Self {
        Self::new(true)
    }
}
