//! Shadow-map state and light-space frustum fitting.

use glam::{Mat4, Vec3};

use crate::backend::{FramebufferId, RenderBackend, ShaderId, ShaderKind, TextureId};
use crate::config::SceneConfig;
use crate::error::Result;

/// Up vector of the light camera, tilted off +Y so straight-down lights do
/// not degenerate.
pub const LIGHT_UP: Vec3 = Vec3::new(0.0, 1.0, 0.001);

/// Strategy for placing the light's view and projection.
pub trait ShadowFrustum: std::fmt::Debug {
    fn light_view(&self, direction: Vec3) -> Mat4;

    fn light_proj(&self) -> Mat4;

    /// `light_proj · light_view`.
    fn light_space(&self, direction: Vec3) -> Mat4 {
        self.light_proj() * self.light_view(direction)
    }
}

/// Fixed box around the world origin. Geometry outside it casts no shadow.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OriginShadowFrustum {
    pub half_width: f32,
    pub depth: f32,
    pub distance: f32,
}

impl OriginShadowFrustum {
    pub const NEAR: f32 = 0.01;

    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            half_width: config.shadow_half_width,
            depth: config.shadow_depth,
            distance: config.light_distance,
        }
    }
}

impl Default for OriginShadowFrustum {
    fn default() -> Self {
        Self::from_config(&SceneConfig::default())
    }
}

impl ShadowFrustum for OriginShadowFrustum {
    fn light_view(&self, direction: Vec3) -> Mat4 {
        let dir = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        Mat4::look_at_rh(-self.distance * dir, Vec3::ZERO, LIGHT_UP)
    }

    fn light_proj(&self) -> Mat4 {
        let w = self.half_width;
        Mat4::orthographic_rh(-w, w, -w, w, Self::NEAR, self.depth)
    }
}

/// Backend resources and matrices of a configured shadow map.
#[derive(Debug, Clone)]
pub struct ShadowMap {
    pub framebuffer: FramebufferId,
    pub texture: TextureId,
    pub size: u32,
    pub depth_shader: ShaderId,
    pub view: Mat4,
    pub proj: Mat4,
}

impl ShadowMap {
    /// Allocates the depth target and the depth-only program.
    pub fn create(gfx: &mut impl RenderBackend, size: u32) -> Result<Self> {
        let (framebuffer, texture) = gfx.create_depth_target(size)?;
        let depth_shader = gfx.create_shader(ShaderKind::Depth)?;
        log::info!("shadow map ready ({size}x{size})");
        Ok(Self {
            framebuffer,
            texture,
            size,
            depth_shader,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        })
    }

    pub fn fit(&mut self, frustum: &dyn ShadowFrustum, direction: Vec3) {
        self.view = frustum.light_view(direction);
        self.proj = frustum.light_proj();
    }

    pub fn light_space(&self) -> Mat4 {
        self.proj * self.view
    }

    /// Frees the depth target, its texture and the depth program.
    pub fn release(self, gfx: &mut impl RenderBackend) {
        gfx.destroy_framebuffer(self.framebuffer);
        gfx.destroy_texture(self.texture);
        gfx.destroy_shader(self.depth_shader);
    }
}
