//! Scripted collaborators for host tests

use core::fmt::Write;

use crate::dispatch::FrameDisplay;
use crate::gallery::{AlbumList, AlbumName, ImageLibrary, ImageName, ImageSource, RandomSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    RemoteCheck,
    Listing,
    Album,
    Load,
    Render,
}

/// In-memory albums; images are named `IMG00000.PNG`, `IMG00001.PNG`, ...
#[derive(Debug, Clone, Default)]
pub struct MockLibrary {
    albums: Vec<(String, usize)>,
    remote: bool,
    failing_remote_check: bool,
    failing_album: Option<String>,
    failing_listing: bool,
    failing_load: bool,
}

impl MockLibrary {
    pub fn new(albums: &[(&str, usize)]) -> Self {
        Self {
            albums: albums.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
            ..Default::default()
        }
    }

    pub fn with_remote(mut self) -> Self {
        self.remote = true;
        self
    }

    pub fn failing_remote_check(mut self) -> Self {
        self.failing_remote_check = true;
        self
    }

    pub fn failing_album(mut self, name: &str) -> Self {
        self.failing_album = Some(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.failing_load = true;
        self
    }

    pub fn local(album: &str, index: usize) -> ImageSource {
        ImageSource::Local {
            album: AlbumName::try_from(album).unwrap(),
            image: Self::image(index),
        }
    }

    fn image(index: usize) -> ImageName {
        let mut name = ImageName::new();
        write!(name, "IMG{:05}.PNG", index).unwrap();
        name
    }
}

impl ImageLibrary for MockLibrary {
    type Error = MockError;

    fn remote_artifact_present(&mut self) -> Result<bool, MockError> {
        if self.failing_remote_check {
            return Err(MockError::RemoteCheck);
        }
        Ok(self.remote)
    }

    fn enabled_albums(&mut self) -> Result<AlbumList, MockError> {
        if self.failing_listing {
            return Err(MockError::Listing);
        }
        let mut list = AlbumList::new();
        for (name, _) in &self.albums {
            list.push(AlbumName::try_from(name.as_str()).unwrap()).unwrap();
        }
        Ok(list)
    }

    fn image_count(&mut self, album: &str) -> Result<usize, MockError> {
        if self.failing_album.as_deref() == Some(album) {
            return Err(MockError::Album);
        }
        self.albums
            .iter()
            .find(|(name, _)| name == album)
            .map(|(_, count)| *count)
            .ok_or(MockError::Album)
    }

    fn image_name(&mut self, album: &str, index: usize) -> Result<ImageName, MockError> {
        match self.image_count(album)? {
            count if index < count => Ok(Self::image(index)),
            _ => Err(MockError::Album),
        }
    }

    /// The "encoded image" is the display form of the source
    fn load(&mut self, source: &ImageSource, buf: &mut [u8]) -> Result<usize, MockError> {
        if self.failing_load {
            return Err(MockError::Load);
        }
        let text = source.to_string();
        let bytes = text.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }
}

/// Records every rendered image
#[derive(Debug, Default)]
pub struct MockDisplay {
    pub busy: bool,
    pub fail: bool,
    pub rendered: Vec<Vec<u8>>,
}

impl FrameDisplay for MockDisplay {
    type Error = MockError;

    fn is_busy(&mut self) -> bool {
        self.busy
    }

    fn render(&mut self, image: &[u8]) -> Result<(), MockError> {
        if self.fail {
            return Err(MockError::Render);
        }
        self.rendered.push(image.to_vec());
        Ok(())
    }
}

/// Replays a fixed sequence of values, cycling at the end
#[derive(Debug, Clone)]
pub struct SequenceRng {
    values: Vec<u32>,
    next: usize,
}

impl SequenceRng {
    pub fn new(values: &[u32]) -> Self {
        Self {
            values: values.to_vec(),
            next: 0,
        }
    }
}

impl RandomSource for SequenceRng {
    fn next_u32(&mut self) -> u32 {
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}
