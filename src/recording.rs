//! Headless [`RenderBackend`] that records every draw.
//!
//! Each draw is captured together with the state it would have used on a
//! GPU: program, uniforms, bound textures, target, cull mode and the vertices
//! it read. Tests and offline tools inspect the log instead of pixels.

use std::collections::{BTreeMap, HashMap};

use crate::backend::{
    BufferId, CullMode, FramebufferId, RenderBackend, ShaderId, ShaderKind, TextureId, UniformValue, VertexLayout,
};
use crate::color::ColorRgba;
use crate::error::{GfxError, Result};
use crate::texture::{TextureImage, TextureUnit};

/// One captured draw.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub shader: Option<ShaderId>,
    pub kind: Option<ShaderKind>,
    pub buffer: BufferId,
    pub vertex_count: u32,
    /// The floats the draw consumed.
    pub vertices: Vec<f32>,
    /// `None` is the window target.
    pub framebuffer: Option<FramebufferId>,
    pub textures: BTreeMap<TextureUnit, TextureId>,
    pub cull: CullMode,
    pub viewport: Option<(u32, u32)>,
    pub uniforms: HashMap<String, UniformValue>,
}

impl DrawCall {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(name).copied()
    }

    pub fn texture_at(&self, unit: TextureUnit) -> Option<TextureId> {
        self.textures.get(&unit).copied()
    }

    /// Vertex positions, skipping the non-position attributes of each vertex.
    pub fn positions(&self, layout: VertexLayout) -> impl Iterator<Item = &[f32]> + '_ {
        let dims = match layout {
            VertexLayout::Mesh => 3,
            VertexLayout::Overlay => 2,
        };
        self.vertices.chunks_exact(layout.width()).map(move |v| &v[..dims])
    }
}

/// A captured `clear`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearCall {
    pub framebuffer: Option<FramebufferId>,
    pub color: Option<ColorRgba>,
    pub depth: bool,
}

#[derive(Debug)]
struct RecordedBuffer {
    layout: VertexLayout,
    capacity: usize,
    data: Vec<f32>,
}

#[derive(Debug, Copy, Clone)]
struct RecordedTexture {
    width: u32,
    height: u32,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    shaders: Vec<Option<ShaderKind>>,
    uniforms: Vec<HashMap<String, UniformValue>>,
    buffers: HashMap<BufferId, RecordedBuffer>,
    next_buffer: u32,
    textures: Vec<Option<RecordedTexture>>,
    framebuffers: Vec<Option<TextureId>>,
    current_shader: Option<ShaderId>,
    bound_textures: BTreeMap<TextureUnit, TextureId>,
    target: Option<FramebufferId>,
    viewport: Option<(u32, u32)>,
    cull: CullMode,
    draws: Vec<DrawCall>,
    clears: Vec<ClearCall>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn clears(&self) -> &[ClearCall] {
        &self.clears
    }

    /// Forgets recorded draws and clears; resources and bound state stay.
    pub fn clear_draws(&mut self) {
        self.draws.clear();
        self.clears.clear();
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.iter().flatten().count()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.iter().flatten().count()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.iter().flatten().count()
    }

    pub fn shader_kind(&self, shader: ShaderId) -> Option<ShaderKind> {
        self.shaders.get(shader.0 as usize).copied().flatten()
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(texture.0 as usize)
            .copied()
            .flatten()
            .map(|t| (t.width, t.height))
    }

    /// The latest value written to a uniform of `shader`.
    pub fn uniform(&self, shader: ShaderId, name: &str) -> Option<UniformValue> {
        self.uniforms.get(shader.0 as usize)?.get(name).copied()
    }

    fn check_shader(&self, shader: ShaderId) -> Result<()> {
        match self.shader_kind(shader) {
            Some(_) => Ok(()),
            None => Err(GfxError::UnknownShader(shader)),
        }
    }

    fn push_texture(&mut self, width: u32, height: u32) -> TextureId {
        self.textures.push(Some(RecordedTexture { width, height }));
        TextureId(self.textures.len() as u32 - 1)
    }
}

impl RenderBackend for RecordingBackend {
    fn create_shader(&mut self, kind: ShaderKind) -> Result<ShaderId> {
        self.shaders.push(Some(kind));
        self.uniforms.push(HashMap::new());
        Ok(ShaderId(self.shaders.len() as u32 - 1))
    }

    fn use_shader(&mut self, shader: ShaderId) -> Result<()> {
        self.check_shader(shader)?;
        self.current_shader = Some(shader);
        Ok(())
    }

    fn set_uniform(&mut self, shader: ShaderId, name: &str, value: UniformValue) -> Result<()> {
        self.check_shader(shader)?;
        self.uniforms[shader.0 as usize].insert(name.to_owned(), value);
        Ok(())
    }

    fn create_vertex_buffer(&mut self, layout: VertexLayout, capacity: usize) -> Result<BufferId> {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, RecordedBuffer { layout, capacity, data: Vec::new() });
        Ok(id)
    }

    fn write_vertices(&mut self, buffer: BufferId, data: &[f32]) -> Result<()> {
        let buf = self.buffers.get_mut(&buffer).ok_or(GfxError::UnknownBuffer(buffer))?;
        if data.len() > buf.capacity {
            return Err(GfxError::BufferOverflow { needed: data.len(), capacity: buf.capacity });
        }
        buf.data.clear();
        buf.data.extend_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_none() {
            log::warn!("destroy of unknown buffer {buffer:?}");
        }
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        match self.shaders.get_mut(shader.0 as usize).and_then(Option::take) {
            Some(_) => self.uniforms[shader.0 as usize].clear(),
            None => log::warn!("destroy of unknown shader {shader:?}"),
        }
        if self.current_shader == Some(shader) {
            self.current_shader = None;
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId> {
        Ok(self.push_texture(image.width, image.height))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.get_mut(texture.0 as usize).and_then(Option::take).is_none() {
            log::warn!("destroy of unknown texture {texture:?}");
        }
        self.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn create_depth_target(&mut self, size: u32) -> Result<(FramebufferId, TextureId)> {
        let texture = self.push_texture(size, size);
        self.framebuffers.push(Some(texture));
        Ok((FramebufferId(self.framebuffers.len() as u32 - 1), texture))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.get_mut(framebuffer.0 as usize).and_then(Option::take).is_none() {
            log::warn!("destroy of unknown framebuffer {framebuffer:?}");
        }
        if self.target == Some(framebuffer) {
            self.target = None;
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId) -> Result<()> {
        if self.texture_size(texture).is_none() {
            return Err(GfxError::UnknownTexture(texture));
        }
        self.bound_textures.insert(unit, texture);
        Ok(())
    }

    fn bind_framebuffer(&mut self, target: Option<FramebufferId>) -> Result<()> {
        if let Some(fb) = target {
            if !self.framebuffers.get(fb.0 as usize).is_some_and(Option::is_some) {
                return Err(GfxError::UnknownFramebuffer(fb));
            }
        }
        self.target = target;
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull = mode;
    }

    fn clear(&mut self, color: Option<ColorRgba>, depth: bool) {
        self.clears.push(ClearCall { framebuffer: self.target, color, depth });
    }

    fn draw(&mut self, buffer: BufferId, vertex_count: u32) -> Result<()> {
        let buf = self.buffers.get(&buffer).ok_or(GfxError::UnknownBuffer(buffer))?;
        let needed = vertex_count as usize * buf.layout.width();
        if needed > buf.data.len() {
            return Err(GfxError::BufferOverflow { needed, capacity: buf.data.len() });
        }
        let kind = self.current_shader.and_then(|s| self.shader_kind(s));
        if let Some(kind) = kind {
            if kind.vertex_layout() != buf.layout {
                log::warn!("{kind:?} program drawing a {:?} buffer", buf.layout);
            }
        }
        let uniforms = self
            .current_shader
            .map(|s| self.uniforms[s.0 as usize].clone())
            .unwrap_or_default();
        self.draws.push(DrawCall {
            shader: self.current_shader,
            kind,
            buffer,
            vertex_count,
            vertices: buf.data[..needed].to_vec(),
            framebuffer: self.target,
            textures: self.bound_textures.clone(),
            cull: self.cull,
            viewport: self.viewport,
            uniforms,
        });
        Ok(())
    }
}
