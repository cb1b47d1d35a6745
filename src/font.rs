// Glyph sources for 2D text

use std::collections::HashMap;
use std::path::Path;

use crate::backend::{RenderBackend, TextureId};
use crate::error::{GfxError, Result};
use crate::texture::{PixelFormat, TextureImage};

/// Rasterized glyph: a coverage texture plus layout metrics in pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    /// `None` for glyphs with an empty bitmap, such as space.
    pub texture: Option<TextureId>,
    pub size: (u32, u32),
    /// Offset from the pen position to the bitmap's left and top edges.
    pub bearing: (i32, i32),
    /// Horizontal advance in 26.6 fixed point.
    pub advance: i64,
}

impl Glyph {
    /// Advance in whole pixels.
    pub fn advance_px(&self) -> i64 {
        self.advance >> 6
    }
}

/// Something text can be laid out with.
pub trait GlyphSource {
    fn glyph(&self, ch: char) -> Option<&Glyph>;

    /// Nominal pixel size the glyphs were rasterized at.
    fn size(&self) -> f32;

    fn is_ready(&self) -> bool;
}

/// ASCII font rasterized once at load time with `fontdue`.
#[derive(Debug, Clone)]
pub struct Font {
    glyphs: HashMap<char, Glyph>,
    size: f32,
    ready: bool,
}

impl Font {
    /// Characters rasterized at load.
    pub const CHARSET: std::ops::Range<u8> = 0..128;

    /// A font with no glyphs. Text drawn with it is skipped.
    pub fn not_ready(size: f32) -> Self {
        Self { glyphs: HashMap::new(), size, ready: false }
    }

    /// Builds a font from already uploaded glyphs.
    pub fn from_glyphs(size: f32, glyphs: impl IntoIterator<Item = (char, Glyph)>) -> Self {
        Self { glyphs: glyphs.into_iter().collect(), size, ready: true }
    }

    pub fn try_load(gfx: &mut impl RenderBackend, bytes: &[u8], size: f32) -> Result<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| GfxError::Font(e.to_string()))?;

        let mut glyphs = HashMap::with_capacity(Self::CHARSET.len());
        for code in Self::CHARSET {
            let ch = char::from(code);
            let (metrics, coverage) = font.rasterize(ch, size);
            let (width, height) = (metrics.width as u32, metrics.height as u32);
            let texture = if width > 0 && height > 0 {
                let image = TextureImage::new(width, height, PixelFormat::R8, coverage)?;
                Some(gfx.create_texture(&image)?)
            } else {
                None
            };
            glyphs.insert(
                ch,
                Glyph {
                    texture,
                    size: (width, height),
                    bearing: (metrics.xmin, metrics.ymin + metrics.height as i32),
                    advance: (metrics.advance_width * 64.0).round() as i64,
                },
            );
        }
        log::info!("rasterized {} glyphs at {size}px", glyphs.len());
        Ok(Self { glyphs, size, ready: true })
    }

    /// Loads a font, logging failures and returning a not-ready font instead.
    pub fn load(gfx: &mut impl RenderBackend, bytes: &[u8], size: f32) -> Self {
        Self::try_load(gfx, bytes, size).unwrap_or_else(|e| {
            log::error!("{e}");
            Self::not_ready(size)
        })
    }

    pub fn try_from_file(gfx: &mut impl RenderBackend, path: impl AsRef<Path>, size: f32) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::try_load(gfx, &bytes, size)
    }

    /// Like [`Font::load`], reading the font from `path`.
    pub fn from_file(gfx: &mut impl RenderBackend, path: impl AsRef<Path>, size: f32) -> Self {
        let path = path.as_ref();
        Self::try_from_file(gfx, path, size).unwrap_or_else(|e| {
            log::error!("failed to load font {}: {e}", path.display());
            Self::not_ready(size)
        })
    }

    /// Destroys the glyph textures. The font is not ready afterwards.
    pub fn release(&mut self, gfx: &mut impl RenderBackend) {
        for glyph in self.glyphs.values() {
            if let Some(texture) = glyph.texture {
                gfx.destroy_texture(texture);
            }
        }
        self.glyphs.clear();
        self.ready = false;
    }
}

impl GlyphSource for Font {
    fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs.get(&ch)
    }

    fn size(&self) -> f32 {
        self.size
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
