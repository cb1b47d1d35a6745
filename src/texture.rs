// Texture images, uploaded textures and texture-unit allocation

use std::path::Path;

use crate::backend::{RenderBackend, TextureId};
use crate::error::{GfxError, Result};

/// Pixel layout of a decoded image, selected by channel count.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn from_channel_count(channels: u8) -> Result<Self> {
        match channels {
            1 => Ok(PixelFormat::R8),
            2 => Ok(PixelFormat::Rg8),
            3 => Ok(PixelFormat::Rgb8),
            4 => Ok(PixelFormat::Rgba8),
            n => Err(GfxError::UnsupportedChannels(n)),
        }
    }

    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rg8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Decoded, tightly packed 8-bit image data ready for upload.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.channels();
        if pixels.len() != expected {
            return Err(GfxError::Image(image::ImageError::Parameter(
                image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ),
            )));
        }
        Ok(Self { width, height, format, pixels })
    }

    /// Decodes an image file, keeping its channel count.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let format = PixelFormat::from_channel_count(img.color().channel_count())?;
        let (width, height) = (img.width(), img.height());
        let pixels = match format {
            PixelFormat::R8 => img.into_luma8().into_raw(),
            PixelFormat::Rg8 => img.into_luma_alpha8().into_raw(),
            PixelFormat::Rgb8 => img.into_rgb8().into_raw(),
            PixelFormat::Rgba8 => img.into_rgba8().into_raw(),
        };
        log::debug!("decoded {} ({width}x{height}, {format:?})", path.display());
        Ok(Self { width, height, format, pixels })
    }

    /// Expands to four channels. Gray maps to RGB, gray+alpha keeps alpha.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.pixels.clone(),
            PixelFormat::Rgb8 => self
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            PixelFormat::Rg8 => self
                .pixels
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            PixelFormat::R8 => self.pixels.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        }
    }
}

/// A texture living on the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
}

impl Texture {
    pub fn upload(gfx: &mut impl RenderBackend, image: &TextureImage) -> Result<Self> {
        let id = gfx.create_texture(image)?;
        Ok(Self { id, width: image.width, height: image.height })
    }

    pub fn from_file(gfx: &mut impl RenderBackend, path: impl AsRef<Path>) -> Result<Self> {
        Self::upload(gfx, &TextureImage::load(path)?)
    }

    pub fn release(self, gfx: &mut impl RenderBackend) {
        gfx.destroy_texture(self.id);
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Index of a texture binding slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(u32);

impl TextureUnit {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

pub const DEFAULT_TEXTURE_UNITS: u32 = 16;

/// Hands out texture units to the owners that bind textures.
///
/// Units are released explicitly, so slots never run out just because
/// textures were created; only simultaneous reservations count.
#[derive(Debug, Clone)]
pub struct TextureUnits {
    in_use: Vec<bool>,
}

impl Default for TextureUnits {
    fn default() -> Self {
        Self::new(DEFAULT_TEXTURE_UNITS)
    }
}

impl TextureUnits {
    pub fn new(count: u32) -> Self {
        Self { in_use: vec![false; count as usize] }
    }

    /// Reserves the lowest free unit.
    pub fn allocate(&mut self) -> Result<TextureUnit> {
        let index = self
            .in_use
            .iter()
            .position(|used| !used)
            .ok_or(GfxError::TextureUnitsExhausted(self.in_use.len() as u32))?;
        self.in_use[index] = true;
        Ok(TextureUnit(index as u32))
    }

    pub fn release(&mut self, unit: TextureUnit) {
        if let Some(slot) = self.in_use.get_mut(unit.0 as usize) {
            *slot = false;
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }
}
