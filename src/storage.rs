//! SD card storage
//!
//! Holds the config document, the local albums and the last downloaded
//! remote image on the card's FAT filesystem. All names are 8.3.
//!
//! Directory structure:
//! /CONFIG.JSN          - frame configuration (JSON)
//! /REMOTE.PNG          - last remote gallery image
//! /ALBUMS/<NAME>/*.PNG - local albums, one directory each

use core::fmt::Write as FmtWrite;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{
    DirEntry, Mode, SdCard, ShortFileName, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};
use log::{debug, info, warn};
use photoframe_core::config::{ConfigError, FrameConfig};
use photoframe_core::gallery::{AlbumList, AlbumName, ImageLibrary, ImageName, ImageSource};
use thiserror::Error;

pub const CONFIG_FILE: &str = "CONFIG.JSN";
pub const REMOTE_FILE: &str = "REMOTE.PNG";
pub const ALBUMS_DIR: &str = "ALBUMS";

const IMAGE_EXT: &str = "PNG";

/// Largest accepted config document
const CONFIG_BUF_SIZE: usize = 1024;

/// SD cards need timestamps for new files; the frame does not track dates
/// precisely enough to matter
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 56, // 2026
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SD card not responding")]
    SdCard,
    #[error("file not found")]
    NotFound,
    #[error("filesystem error")]
    Filesystem,
    #[error("file does not fit in the buffer")]
    TooLarge,
    #[error("write failed")]
    Write,
    #[error("read failed")]
    Read,
    #[error("bad config: {0}")]
    Config(#[from] ConfigError),
}

fn not_found_or<E: core::fmt::Debug>(
    fallback: StorageError,
) -> impl FnOnce(embedded_sdmmc::Error<E>) -> StorageError {
    move |e| match e {
        embedded_sdmmc::Error::NotFound => StorageError::NotFound,
        _ => fallback,
    }
}

/// Render an 8.3 directory entry name as `BASE.EXT` (or `BASE`)
fn entry_name(name: &ShortFileName) -> Option<ImageName> {
    let base = core::str::from_utf8(name.base_name()).ok()?.trim();
    let ext = core::str::from_utf8(name.extension()).ok()?.trim();

    let mut full = ImageName::new();
    if ext.is_empty() {
        write!(full, "{}", base).ok()?;
    } else {
        write!(full, "{}.{}", base, ext).ok()?;
    }
    Some(full)
}

fn is_album_dir(entry: &DirEntry) -> bool {
    entry.attributes.is_directory() && !entry.name.base_name().starts_with(b".")
}

fn is_image_file(entry: &DirEntry) -> bool {
    !entry.attributes.is_directory()
        && !entry.attributes.is_hidden()
        && entry.name.extension().eq_ignore_ascii_case(IMAGE_EXT.as_bytes())
}

pub struct SdStorage<SPI: SpiDevice, DELAY: DelayNs> {
    volume_mgr: VolumeManager<SdCard<SPI, DELAY>, FixedTimeSource>,
}

impl<SPI, DELAY> SdStorage<SPI, DELAY>
where
    SPI: SpiDevice,
    DELAY: DelayNs,
{
    pub fn new(spi: SPI, delay: DELAY) -> Result<Self, StorageError> {
        let sd_card = SdCard::new(spi, delay);

        // Get card size to verify it's working
        match sd_card.num_bytes() {
            Ok(size) => info!("SD card size: {} MB", size / 1024 / 1024),
            Err(_) => return Err(StorageError::SdCard),
        }

        let volume_mgr = VolumeManager::new(sd_card, FixedTimeSource);
        Ok(Self { volume_mgr })
    }

    /// Read a file in the root directory into `buf`, returns bytes read
    pub fn read_root_file(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Filesystem)?;
        let mut root_dir = volume.open_root_dir().map_err(|_| StorageError::Filesystem)?;
        let mut file = root_dir
            .open_file_in_dir(name, Mode::ReadOnly)
            .map_err(not_found_or(StorageError::Read))?;

        if file.length() as usize > buf.len() {
            return Err(StorageError::TooLarge);
        }

        let mut total_read = 0;
        loop {
            match file.read(&mut buf[total_read..]) {
                Ok(0) => break,
                Ok(n) => total_read += n,
                Err(_) => return Err(StorageError::Read),
            }
        }

        debug!("Read {} bytes from {}", total_read, name);
        Ok(total_read)
    }

    /// Load the config document. `Ok(None)` when the card has none.
    pub fn load_config(&mut self) -> Result<Option<FrameConfig>, StorageError> {
        let mut buf = [0u8; CONFIG_BUF_SIZE];
        let len = match self.read_root_file(CONFIG_FILE, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(FrameConfig::from_json(&buf[..len])?))
    }

    /// `Ok(false)` only when the card reads fine and has no remote image
    pub fn has_remote_image(&mut self) -> Result<bool, StorageError> {
        let mut volume = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(|e| {
            warn!("Cannot open volume to look for {}: {:?}", REMOTE_FILE, e);
            StorageError::Filesystem
        })?;
        let mut root_dir = volume.open_root_dir().map_err(|e| {
            warn!("Cannot open root dir to look for {}: {:?}", REMOTE_FILE, e);
            StorageError::Filesystem
        })?;
        match root_dir.open_file_in_dir(REMOTE_FILE, Mode::ReadOnly) {
            Ok(_) => Ok(true),
            Err(embedded_sdmmc::Error::NotFound) => Ok(false),
            Err(e) => {
                warn!("Cannot open {}: {:?}", REMOTE_FILE, e);
                Err(StorageError::Read)
            }
        }
    }

    /// Replace the remote image with freshly downloaded data
    pub fn write_remote_image(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let mut volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Filesystem)?;
        let mut root_dir = volume.open_root_dir().map_err(|_| StorageError::Filesystem)?;
        let mut file = root_dir
            .open_file_in_dir(REMOTE_FILE, Mode::ReadWriteCreateOrTruncate)
            .map_err(|_| StorageError::Write)?;

        file.write(data).map_err(|_| StorageError::Write)?;

        info!("Wrote {} bytes to {}", data.len(), REMOTE_FILE);
        Ok(())
    }

    /// Remove the remote image so the next dispatch uses local albums
    pub fn delete_remote_image(&mut self) -> Result<(), StorageError> {
        let mut volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Filesystem)?;
        let mut root_dir = volume.open_root_dir().map_err(|_| StorageError::Filesystem)?;

        match root_dir.delete_file_in_dir(REMOTE_FILE) {
            Ok(()) => {
                info!("Removed {}", REMOTE_FILE);
                Ok(())
            }
            Err(embedded_sdmmc::Error::NotFound) => Ok(()),
            Err(_) => Err(StorageError::Write),
        }
    }

    /// Album directories under `/ALBUMS`, in directory order
    pub fn list_albums(&mut self) -> Result<AlbumList, StorageError> {
        let mut volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Filesystem)?;
        let mut root_dir = volume.open_root_dir().map_err(|_| StorageError::Filesystem)?;
        let mut albums_dir = match root_dir.open_dir(ALBUMS_DIR) {
            Ok(dir) => dir,
            Err(embedded_sdmmc::Error::NotFound) => {
                warn!("No {} directory on the card", ALBUMS_DIR);
                return Ok(AlbumList::new());
            }
            Err(_) => return Err(StorageError::Filesystem),
        };

        let mut albums = AlbumList::new();
        albums_dir
            .iterate_dir(|entry| {
                if !is_album_dir(entry) {
                    return;
                }
                if let Some(name) = entry_name(&entry.name)
                    && albums.push(name).is_err()
                {
                    warn!("Too many albums, ignoring {}", entry.name);
                }
            })
            .map_err(|_| StorageError::Read)?;

        Ok(albums)
    }

    /// Count images in an album, or fetch the name of the `want`th one
    fn scan_album(
        &mut self,
        album: &str,
        want: Option<usize>,
    ) -> Result<(usize, Option<ImageName>), StorageError> {
        let mut volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Filesystem)?;
        let mut root_dir = volume.open_root_dir().map_err(|_| StorageError::Filesystem)?;
        let mut albums_dir = root_dir
            .open_dir(ALBUMS_DIR)
            .map_err(not_found_or(StorageError::Filesystem))?;
        let mut album_dir = albums_dir
            .open_dir(album)
            .map_err(not_found_or(StorageError::Filesystem))?;

        let mut count = 0;
        let mut found = None;
        album_dir
            .iterate_dir(|entry| {
                if !is_image_file(entry) {
                    return;
                }
                if want == Some(count) {
                    found = entry_name(&entry.name);
                }
                count += 1;
            })
            .map_err(|_| StorageError::Read)?;

        Ok((count, found))
    }

    pub fn album_image_count(&mut self, album: &str) -> Result<usize, StorageError> {
        self.scan_album(album, None).map(|(count, _)| count)
    }

    pub fn album_image_name(&mut self, album: &str, index: usize) -> Result<ImageName, StorageError> {
        self.scan_album(album, Some(index))?
            .1
            .ok_or(StorageError::NotFound)
    }

    /// Read an album image into `buf`, returns bytes read
    pub fn read_album_image(
        &mut self,
        album: &str,
        image: &str,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let mut volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Filesystem)?;
        let mut root_dir = volume.open_root_dir().map_err(|_| StorageError::Filesystem)?;
        let mut albums_dir = root_dir
            .open_dir(ALBUMS_DIR)
            .map_err(not_found_or(StorageError::Filesystem))?;
        let mut album_dir = albums_dir
            .open_dir(album)
            .map_err(not_found_or(StorageError::Filesystem))?;
        let mut file = album_dir
            .open_file_in_dir(image, Mode::ReadOnly)
            .map_err(not_found_or(StorageError::Read))?;

        if file.length() as usize > buf.len() {
            return Err(StorageError::TooLarge);
        }

        let mut total_read = 0;
        loop {
            match file.read(&mut buf[total_read..]) {
                Ok(0) => break,
                Ok(n) => total_read += n,
                Err(_) => return Err(StorageError::Read),
            }
        }

        debug!("Read {} bytes from {}/{}", total_read, album, image);
        Ok(total_read)
    }
}

/// The card as an [`ImageLibrary`], filtered by the configured albums
pub struct SdGallery<'a, SPI: SpiDevice, DELAY: DelayNs> {
    storage: &'a mut SdStorage<SPI, DELAY>,
    config: &'a FrameConfig,
}

impl<'a, SPI, DELAY> SdGallery<'a, SPI, DELAY>
where
    SPI: SpiDevice,
    DELAY: DelayNs,
{
    pub fn new(storage: &'a mut SdStorage<SPI, DELAY>, config: &'a FrameConfig) -> Self {
        Self { storage, config }
    }
}

impl<SPI, DELAY> ImageLibrary for SdGallery<'_, SPI, DELAY>
where
    SPI: SpiDevice,
    DELAY: DelayNs,
{
    type Error = StorageError;

    fn remote_artifact_present(&mut self) -> Result<bool, StorageError> {
        self.storage.has_remote_image()
    }

    fn enabled_albums(&mut self) -> Result<AlbumList, StorageError> {
        let mut albums = self.storage.list_albums()?;
        albums.retain(|name: &AlbumName| self.config.album_enabled(name));
        info!("{} enabled album(s)", albums.len());
        Ok(albums)
    }

    fn image_count(&mut self, album: &str) -> Result<usize, StorageError> {
        self.storage.album_image_count(album)
    }

    fn image_name(&mut self, album: &str, index: usize) -> Result<ImageName, StorageError> {
        self.storage.album_image_name(album, index)
    }

    fn load(&mut self, source: &ImageSource, buf: &mut [u8]) -> Result<usize, StorageError> {
        match source {
            ImageSource::Remote => self.storage.read_root_file(REMOTE_FILE, buf),
            ImageSource::Local { album, image } => {
                self.storage.read_album_image(album, image, buf)
            }
        }
    }
}
