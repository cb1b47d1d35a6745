// Lights

use glam::Vec3;

use crate::backend::{RenderBackend, ShaderId};
use crate::color::{colors, ColorRgba};
use crate::error::Result;

/// The scene's single directional light.
///
/// `direction` is the direction light travels; the shadow camera sits on the
/// opposite side of the origin. `shader` is the program whose light uniforms
/// get filled before the color pass, normally the same lit program the
/// objects use.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub ambient: ColorRgba,
    pub diffuse: ColorRgba,
    pub specular: ColorRgba,
    pub shader: ShaderId,
}

impl DirectionalLight {
    pub fn new(direction: Vec3, shader: ShaderId) -> Self {
        Self {
            direction,
            ambient: colors::GREY25,
            diffuse: colors::WHITE,
            specular: colors::WHITE,
            shader,
        }
    }

    pub fn with_colors(mut self, ambient: ColorRgba, diffuse: ColorRgba, specular: ColorRgba) -> Self {
        self.ambient = ambient;
        self.diffuse = diffuse;
        self.specular = specular;
        self
    }

    /// Writes the `dirLight.*` uniforms and the viewer position.
    pub fn bind(&self, gfx: &mut impl RenderBackend, view_pos: Vec3) -> Result<()> {
        gfx.use_shader(self.shader)?;
        gfx.set_uniform(self.shader, "dirLight.dir", self.direction.into())?;
        gfx.set_uniform(self.shader, "dirLight.ambient", self.ambient.into())?;
        gfx.set_uniform(self.shader, "dirLight.diffuse", self.diffuse.into())?;
        gfx.set_uniform(self.shader, "dirLight.specular", self.specular.into())?;
        gfx.set_uniform(self.shader, "viewPos", view_pos.into())
    }
}
