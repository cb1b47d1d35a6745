// Surface material

use crate::backend::TextureId;
use crate::color::{colors, ColorRgba};

/// Phong-style material. The diffuse map is a non-owning handle; the
/// texture must stay alive on the backend while the material uses it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Material {
    pub diffuse: ColorRgba,
    pub diffuse_map: Option<TextureId>,
    pub specular: ColorRgba,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: colors::WHITE,
            diffuse_map: None,
            specular: colors::WHITE,
            shininess: 1.0,
        }
    }
}

impl Material {
    pub fn new(diffuse: ColorRgba, specular: ColorRgba, shininess: f32) -> Self {
        Self { diffuse, diffuse_map: None, specular, shininess }
    }

    pub fn with_diffuse_map(mut self, texture: TextureId) -> Self {
        self.diffuse_map = Some(texture);
        self
    }
}
