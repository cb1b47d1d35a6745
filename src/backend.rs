//! The rasterization API the scene draws through.
//!
//! The scene never talks to a graphics API directly. It drives a
//! [`RenderBackend`], which exposes the small, GL-shaped surface the scene
//! needs: programs with uniforms addressed by name, dynamic vertex buffers,
//! textures bound to explicit units, one depth-only framebuffer kind, and a
//! triangle-list draw.
//!
//! Resources are identified by copyable handles. The backend owns the native
//! objects; handles held elsewhere are non-owning and must not outlive the
//! backend that issued them.

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::color::ColorRgba;
use crate::error::Result;
use crate::texture::{TextureImage, TextureUnit};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw index into the issuing backend's arena.
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// A compiled shader program.
    ShaderId
);
handle!(
    /// A dynamic vertex buffer.
    BufferId
);
handle!(
    /// A sampled texture (color or depth).
    TextureId
);
handle!(
    /// An offscreen render target with a depth attachment.
    FramebufferId
);

/// Built-in programs. Each kind fixes its vertex layout and the uniform names
/// it understands.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderKind {
    /// Lit meshes with a diffuse map and shadow-map lookup.
    Lit,
    /// Depth-only; used to fill the shadow map.
    Depth,
    /// Screen-space 2D primitives and glyph quads.
    Overlay,
}

impl ShaderKind {
    pub fn vertex_layout(self) -> VertexLayout {
        match self {
            ShaderKind::Lit | ShaderKind::Depth => VertexLayout::Mesh,
            ShaderKind::Overlay => VertexLayout::Overlay,
        }
    }
}

/// Interleaved vertex formats understood by the backends.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexLayout {
    /// position(3) normal(3) texcoord(2)
    Mesh,
    /// position(2) texcoord(2)
    Overlay,
}

impl VertexLayout {
    /// Floats per vertex.
    pub const fn width(self) -> usize {
        match self {
            VertexLayout::Mesh => 8,
            VertexLayout::Overlay => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Back,
    Front,
}

/// Value written to a named uniform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Float2([f32; 2]),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    Bool(bool),
}

impl UniformValue {
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            UniformValue::Int(v) => Some(v),
            UniformValue::Bool(b) => Some(b as i32),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            UniformValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            UniformValue::Bool(b) => Some(b),
            UniformValue::Int(v) => Some(v != 0),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match *self {
            UniformValue::Mat4(m) => Some(m),
            _ => None,
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<(f32, f32)> for UniformValue {
    fn from((a, b): (f32, f32)) -> Self {
        UniformValue::Float2([a, b])
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<ColorRgba> for UniformValue {
    fn from(c: ColorRgba) -> Self {
        UniformValue::Vec4(c.to_vec4())
    }
}

impl From<Mat3> for UniformValue {
    fn from(m: Mat3) -> Self {
        UniformValue::Mat3(m)
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m)
    }
}

impl From<bool> for UniformValue {
    fn from(b: bool) -> Self {
        UniformValue::Bool(b)
    }
}

impl From<TextureUnit> for UniformValue {
    fn from(unit: TextureUnit) -> Self {
        UniformValue::Int(unit.index() as i32)
    }
}

/// Rasterization capability consumed by the scene.
///
/// All calls happen on the thread that owns the rendering context. State set
/// through `use_shader`, `bind_texture`, `bind_framebuffer`, `set_viewport` and
/// `set_cull_mode` persists until changed, and `draw` captures it.
pub trait RenderBackend {
    /// Compiles one of the built-in programs.
    fn create_shader(&mut self, kind: ShaderKind) -> Result<ShaderId>;

    fn use_shader(&mut self, shader: ShaderId) -> Result<()>;

    /// Writes a uniform on `shader`. Uniform values persist per program, like
    /// GL program state. Names the program does not know are ignored.
    fn set_uniform(&mut self, shader: ShaderId, name: &str, value: UniformValue) -> Result<()>;

    /// Allocates a buffer holding up to `capacity` floats.
    fn create_vertex_buffer(&mut self, layout: VertexLayout, capacity: usize) -> Result<BufferId>;

    /// Replaces the buffer's contents from offset 0.
    fn write_vertices(&mut self, buffer: BufferId, data: &[f32]) -> Result<()>;

    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Frees a program and its uniform values. Handles are never reused.
    fn destroy_shader(&mut self, shader: ShaderId);

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId>;

    fn destroy_texture(&mut self, texture: TextureId);

    /// Allocates a square depth-only render target and the texture that
    /// samples it.
    fn create_depth_target(&mut self, size: u32) -> Result<(FramebufferId, TextureId)>;

    /// Frees the render target. The texture returned with it by
    /// `create_depth_target` is destroyed separately.
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId) -> Result<()>;

    /// `None` rebinds the default (window) target.
    fn bind_framebuffer(&mut self, target: Option<FramebufferId>) -> Result<()>;

    fn set_viewport(&mut self, width: u32, height: u32);

    fn set_cull_mode(&mut self, mode: CullMode);

    /// Clears the bound target. `color` is ignored on depth-only targets.
    fn clear(&mut self, color: Option<ColorRgba>, depth: bool);

    /// Draws the first `vertex_count` vertices of `buffer` as a triangle list
    /// with the current program.
    fn draw(&mut self, buffer: BufferId, vertex_count: u32) -> Result<()>;
}
