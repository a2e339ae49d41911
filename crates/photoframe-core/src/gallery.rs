//! Image sources and the local/remote selection policy
//!
//! Local images live in album directories on the SD card. The remote gallery
//! is a single pre-processed image downloaded to a fixed path before dispatch;
//! when it is missing the cycle falls back to the local albums without
//! touching the configured mode.

use core::fmt;

use heapless::{String, Vec};
use log::{info, warn};
use serde::Deserialize;

/// Maximum number of albums considered per cycle
pub const MAX_ALBUMS: usize = 16;

/// FAT 8.3 names: 8 + '.' + 3
pub const MAX_NAME_LEN: usize = 12;

pub type AlbumName = String<MAX_NAME_LEN>;
pub type ImageName = String<MAX_NAME_LEN>;
pub type AlbumList = Vec<AlbumName, MAX_ALBUMS>;

/// Where images come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum GalleryMode {
    /// Random image from the enabled albums
    #[default]
    Local = 0,
    /// Last downloaded remote image, local albums when absent
    Remote = 1,
}

impl GalleryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GalleryMode::Local => "local",
            GalleryMode::Remote => "remote",
        }
    }

    /// Convert from u8 (for RTC memory)
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => GalleryMode::Remote,
            _ => GalleryMode::Local,
        }
    }
}

/// The image chosen for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// The downloaded remote artifact
    Remote,
    /// An image inside a local album
    Local { album: AlbumName, image: ImageName },
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Remote => f.write_str("remote"),
            ImageSource::Local { album, image } => write!(f, "{}/{}", album, image),
        }
    }
}

/// Storage holding the local albums and the remote artifact
pub trait ImageLibrary {
    type Error: fmt::Debug;

    /// Whether a previously downloaded remote image is available.
    /// An error means the storage could not be checked at all.
    fn remote_artifact_present(&mut self) -> Result<bool, Self::Error>;

    /// Albums enabled for rotation, empty ones included
    fn enabled_albums(&mut self) -> Result<AlbumList, Self::Error>;

    fn image_count(&mut self, album: &str) -> Result<usize, Self::Error>;

    /// Name of the `index`th image in an album (directory order)
    fn image_name(&mut self, album: &str, index: usize) -> Result<ImageName, Self::Error>;

    /// Read the encoded image into `buf`, returning the byte count
    fn load(&mut self, source: &ImageSource, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Source of random numbers for image selection
pub trait RandomSource {
    fn next_u32(&mut self) -> u32;
}

/// Small deterministic generator (xorshift32), for bring-up and tests
#[derive(Debug, Clone)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    pub const fn new(seed: u32) -> Self {
        // Zero is a fixed point of xorshift
        let state = if seed == 0 { 0x9E37_79B9 } else { seed };
        Self { state }
    }
}

impl RandomSource for XorShift32 {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

/// Unbiased index in `0..n`. `n` must be non-zero.
pub fn uniform_index<R: RandomSource + ?Sized>(rng: &mut R, n: usize) -> usize {
    debug_assert!(n > 0);
    let n = n.min(u32::MAX as usize) as u32;
    // Reject the low values that would make the modulo uneven
    let threshold = n.wrapping_neg() % n;
    loop {
        let r = rng.next_u32();
        if r >= threshold {
            return (r % n) as usize;
        }
    }
}

/// Chosen source plus whether remote mode had to fall back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub source: ImageSource,
    pub fell_back: bool,
}

/// Why no image could be selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectError<E> {
    /// No enabled album contains an image
    NoEnabledAlbums,
    Library(E),
}

/// Pick the image source for this cycle according to the gallery mode
/// Whether a remote image already on the card may be shown when this cycle got
/// no fresh download. A frame that just switched over from local albums drops
/// it; after a cold boot the previous mode is unknown and the image is kept.
pub fn keep_stale_remote(previous: Option<GalleryMode>, current: GalleryMode) -> bool {
    current == GalleryMode::Remote && previous != Some(GalleryMode::Local)
}

pub fn select_source<L, R>(
    mode: GalleryMode,
    library: &mut L,
    rng: &mut R,
) -> Result<Selection, SelectError<L::Error>>
where
    L: ImageLibrary + ?Sized,
    R: RandomSource + ?Sized,
{
    if mode == GalleryMode::Remote {
        match library.remote_artifact_present() {
            Ok(true) => {
                return Ok(Selection {
                    source: ImageSource::Remote,
                    fell_back: false,
                });
            }
            Ok(false) => info!("Remote image not available, using local albums for this cycle"),
            Err(e) => warn!(
                "Could not check for the remote image ({:?}), using local albums for this cycle",
                e
            ),
        }
    }

    let source = pick_local(library, rng)?;
    Ok(Selection {
        source,
        fell_back: mode == GalleryMode::Remote,
    })
}

/// Uniformly pick a non-empty enabled album, then an image inside it
pub fn pick_local<L, R>(library: &mut L, rng: &mut R) -> Result<ImageSource, SelectError<L::Error>>
where
    L: ImageLibrary + ?Sized,
    R: RandomSource + ?Sized,
{
    let albums = library.enabled_albums().map_err(SelectError::Library)?;

    // (album index, image count)
    let mut candidates: Vec<(usize, usize), MAX_ALBUMS> = Vec::new();
    for (idx, album) in albums.iter().enumerate() {
        match library.image_count(album) {
            Ok(0) => {}
            Ok(count) => {
                let _ = candidates.push((idx, count));
            }
            Err(e) => warn!("Skipping album {}: {:?}", album, e),
        }
    }

    if candidates.is_empty() {
        return Err(SelectError::NoEnabledAlbums);
    }

    let (album_idx, count) = candidates[uniform_index(rng, candidates.len())];
    let album = albums[album_idx].clone();
    let image = library
        .image_name(&album, uniform_index(rng, count))
        .map_err(SelectError::Library)?;

    Ok(ImageSource::Local { album, image })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLibrary, SequenceRng};

    #[test]
    fn test_gallery_mode_from_u8() {
        assert_eq!(GalleryMode::from_u8(0), GalleryMode::Local);
        assert_eq!(GalleryMode::from_u8(1), GalleryMode::Remote);
        assert_eq!(GalleryMode::from_u8(7), GalleryMode::Local);
    }

    #[test]
    fn test_xorshift_is_deterministic_and_never_stuck() {
        let mut a = XorShift32::new(42);
        let mut b = XorShift32::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        let mut zero = XorShift32::new(0);
        assert_ne!(zero.next_u32(), 0);
    }

    #[test]
    fn test_uniform_index_stays_in_range() {
        let mut rng = XorShift32::new(7);
        for n in 1..50 {
            for _ in 0..20 {
                assert!(uniform_index(&mut rng, n) < n);
            }
        }
    }

    #[test]
    fn test_uniform_index_rejects_biased_values() {
        // n = 3: threshold is 2^32 mod 3 = 1, so a 0 draw is thrown away
        let mut rng = SequenceRng::new(&[0, 5]);
        assert_eq!(uniform_index(&mut rng, 3), 2);
    }

    #[test]
    fn test_remote_mode_uses_artifact() {
        let mut library = MockLibrary::new(&[("FAMILY", 3)]).with_remote();
        let mut rng = XorShift32::new(1);
        let selection = select_source(GalleryMode::Remote, &mut library, &mut rng).unwrap();
        assert_eq!(selection.source, ImageSource::Remote);
        assert!(!selection.fell_back);
    }

    #[test]
    fn test_remote_mode_falls_back_to_local() {
        let mut library = MockLibrary::new(&[("FAMILY", 3)]);
        let mut rng = SequenceRng::new(&[0, 2]);
        let selection = select_source(GalleryMode::Remote, &mut library, &mut rng).unwrap();
        assert!(selection.fell_back);
        assert_eq!(selection.source, MockLibrary::local("FAMILY", 2));
    }

    #[test]
    fn test_remote_check_error_falls_back_to_local() {
        let mut library = MockLibrary::new(&[("FAMILY", 3)])
            .with_remote()
            .failing_remote_check();
        let mut rng = SequenceRng::new(&[0, 1]);
        let selection = select_source(GalleryMode::Remote, &mut library, &mut rng).unwrap();
        assert!(selection.fell_back);
        assert_eq!(selection.source, MockLibrary::local("FAMILY", 1));
    }

    #[test]
    fn test_stale_remote_kept_only_while_staying_remote() {
        use super::GalleryMode::*;
        assert!(keep_stale_remote(Some(Remote), Remote));
        assert!(keep_stale_remote(None, Remote));
        assert!(!keep_stale_remote(Some(Local), Remote));
        assert!(!keep_stale_remote(Some(Remote), Local));
        assert!(!keep_stale_remote(None, Local));
    }

    #[test]
    fn test_local_mode_ignores_artifact() {
        let mut library = MockLibrary::new(&[("FAMILY", 1)]).with_remote();
        let mut rng = XorShift32::new(1);
        let selection = select_source(GalleryMode::Local, &mut library, &mut rng).unwrap();
        assert_eq!(selection.source, MockLibrary::local("FAMILY", 0));
        assert!(!selection.fell_back);
    }

    #[test]
    fn test_no_albums() {
        let mut library = MockLibrary::new(&[]);
        let mut rng = XorShift32::new(1);
        assert_eq!(
            select_source(GalleryMode::Local, &mut library, &mut rng),
            Err(SelectError::NoEnabledAlbums)
        );
    }

    #[test]
    fn test_empty_albums_are_skipped() {
        let mut library = MockLibrary::new(&[("EMPTY", 0), ("TRAVEL", 2), ("NOTHING", 0)]);
        let mut rng = XorShift32::new(99);
        for _ in 0..20 {
            let source = pick_local(&mut library, &mut rng).unwrap();
            assert!(matches!(source, ImageSource::Local { ref album, .. } if album == "TRAVEL"));
        }

        let mut library = MockLibrary::new(&[("EMPTY", 0)]);
        assert_eq!(
            pick_local(&mut library, &mut rng),
            Err(SelectError::NoEnabledAlbums)
        );
    }

    #[test]
    fn test_unreadable_album_is_skipped() {
        let mut library = MockLibrary::new(&[("BROKEN", 4), ("OK", 1)]).failing_album("BROKEN");
        let mut rng = XorShift32::new(3);
        assert_eq!(
            pick_local(&mut library, &mut rng).unwrap(),
            MockLibrary::local("OK", 0)
        );
    }

    #[test]
    fn test_album_listing_error_is_reported() {
        let mut library = MockLibrary::new(&[("FAMILY", 1)]).failing_listing();
        let mut rng = XorShift32::new(3);
        assert!(matches!(
            pick_local(&mut library, &mut rng),
            Err(SelectError::Library(_))
        ));
    }

    #[test]
    fn test_albums_are_chosen_uniformly_not_by_size() {
        let mut library = MockLibrary::new(&[("SMALL", 1), ("HUGE", 500), ("MID", 20)]);
        let mut rng = XorShift32::new(0xDEAD_BEEF);
        let mut hits = [0u32; 3];
        let trials = 3000;
        for _ in 0..trials {
            match pick_local(&mut library, &mut rng).unwrap() {
                ImageSource::Local { album, .. } => match album.as_str() {
                    "SMALL" => hits[0] += 1,
                    "HUGE" => hits[1] += 1,
                    _ => hits[2] += 1,
                },
                ImageSource::Remote => unreachable!(),
            }
        }
        for count in hits {
            // Expected 1000 each; allow generous slack for a fixed seed
            assert!((800..1200).contains(&count), "hits = {:?}", hits);
        }
    }

    #[test]
    fn test_source_display() {
        assert_eq!(format!("{}", ImageSource::Remote), "remote");
        assert_eq!(
            format!("{}", MockLibrary::local("FAMILY", 4)),
            "FAMILY/IMG00004.PNG"
        );
    }
}
