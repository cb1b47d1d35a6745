//! wgpu implementation of [`RenderBackend`].
//!
//! The scene talks in GL terms: named uniforms that persist per program,
//! state that stays bound until changed, draws issued one at a time. wgpu
//! wants whole render passes with all resources known up front. The backend
//! bridges the two by recording: every `draw` snapshots its vertices and
//! packed uniforms into per-frame arenas, and [`WgpuBackend::present`]
//! uploads the arenas once and replays the recorded passes.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use winit::window::Window;

use crate::backend::{
    BufferId, CullMode, FramebufferId, RenderBackend, ShaderId, ShaderKind, TextureId, UniformValue, VertexLayout,
};
use crate::color::ColorRgba;
use crate::error::{GfxError, Result};
use crate::texture::{PixelFormat, TextureImage, TextureUnit};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const MIN_ARENA_BYTES: u64 = 64 * 1024;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
const OVERLAY_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];

const LIT_UNIFORMS: &[&str] = &[
    "modelMat",
    "viewMat",
    "projMat",
    "normalMat",
    "lightMat",
    "material.diffuse",
    "material.specular",
    "material.shininess",
    "material.useDiffuseMap",
    "material.diffuseMap",
    "dirLight.dir",
    "dirLight.ambient",
    "dirLight.diffuse",
    "dirLight.specular",
    "viewPos",
    "shadowMap",
    "useShadows",
];
const DEPTH_UNIFORMS: &[&str] = &["modelMat", "viewMat", "projMat"];
const OVERLAY_UNIFORMS: &[&str] = &["transform", "color", "useTex", "tex", "drawDepth"];

fn known_uniforms(kind: ShaderKind) -> &'static [&'static str] {
    match kind {
        ShaderKind::Lit => LIT_UNIFORMS,
        ShaderKind::Depth => DEPTH_UNIFORMS,
        ShaderKind::Overlay => OVERLAY_UNIFORMS,
    }
}

// ============================================================================
// Uniform blocks (must match the WGSL structs)
// ============================================================================

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct LitUniforms {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    light_space: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    diffuse: [f32; 4],
    specular: [f32; 4],
    light_dir: [f32; 4],
    light_ambient: [f32; 4],
    light_diffuse: [f32; 4],
    light_specular: [f32; 4],
    view_pos: [f32; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DepthUniforms {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct OverlayUniforms {
    transform: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
}

/// Uniform values written to one program, by name.
#[derive(Debug, Default)]
struct UniformSet(HashMap<String, UniformValue>);

impl UniformSet {
    fn mat4(&self, name: &str) -> [[f32; 4]; 4] {
        match self.0.get(name) {
            Some(UniformValue::Mat4(m)) => m.to_cols_array_2d(),
            _ => Mat4::IDENTITY.to_cols_array_2d(),
        }
    }

    /// mat3x3 columns are padded to vec4 in uniform memory.
    fn mat3(&self, name: &str) -> [[f32; 4]; 3] {
        match self.0.get(name) {
            Some(UniformValue::Mat3(m)) => [
                m.x_axis.extend(0.0).to_array(),
                m.y_axis.extend(0.0).to_array(),
                m.z_axis.extend(0.0).to_array(),
            ],
            _ => [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
        }
    }

    fn vec4(&self, name: &str, default: Vec4) -> [f32; 4] {
        match self.0.get(name) {
            Some(UniformValue::Vec4(v)) => v.to_array(),
            Some(UniformValue::Vec3(v)) => v.extend(0.0).to_array(),
            _ => default.to_array(),
        }
    }

    fn float(&self, name: &str, default: f32) -> f32 {
        match self.0.get(name) {
            Some(UniformValue::Float(v)) => *v,
            Some(UniformValue::Int(v)) => *v as f32,
            _ => default,
        }
    }

    fn flag(&self, name: &str) -> bool {
        self.0.get(name).and_then(UniformValue::as_bool).unwrap_or(false)
    }

    fn unit(&self, name: &str) -> Option<TextureUnit> {
        let index = self.0.get(name)?.as_int()?;
        u32::try_from(index).ok().map(TextureUnit::new)
    }

    fn as_flag(b: bool) -> f32 {
        if b {
            1.0
        } else {
            0.0
        }
    }

    fn pack(&self, kind: ShaderKind) -> Vec<u8> {
        match kind {
            ShaderKind::Lit => bytemuck::bytes_of(&LitUniforms {
                model: self.mat4("modelMat"),
                view: self.mat4("viewMat"),
                proj: self.mat4("projMat"),
                light_space: self.mat4("lightMat"),
                normal: self.mat3("normalMat"),
                diffuse: self.vec4("material.diffuse", Vec4::ONE),
                specular: self.vec4("material.specular", Vec4::ONE),
                light_dir: self.vec4("dirLight.dir", Vec4::NEG_Y),
                light_ambient: self.vec4("dirLight.ambient", Vec4::ZERO),
                light_diffuse: self.vec4("dirLight.diffuse", Vec4::ONE),
                light_specular: self.vec4("dirLight.specular", Vec4::ONE),
                view_pos: self.vec4("viewPos", Vec4::ZERO),
                params: [
                    self.float("material.shininess", 1.0),
                    Self::as_flag(self.flag("material.useDiffuseMap")),
                    Self::as_flag(self.flag("useShadows")),
                    0.0,
                ],
            })
            .to_vec(),
            ShaderKind::Depth => bytemuck::bytes_of(&DepthUniforms {
                model: self.mat4("modelMat"),
                view: self.mat4("viewMat"),
                proj: self.mat4("projMat"),
            })
            .to_vec(),
            ShaderKind::Overlay => bytemuck::bytes_of(&OverlayUniforms {
                transform: self.mat4("transform"),
                color: self.vec4("color", Vec4::ONE),
                params: [self.float("drawDepth", 0.0), Self::as_flag(self.flag("useTex")), 0.0, 0.0],
            })
            .to_vec(),
        }
    }
}

// ============================================================================
// Recorded frame
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum Target {
    Surface,
    Shadow,
}

type PipelineKey = (ShaderKind, CullMode, Target);

#[derive(Debug)]
struct DrawRecord {
    kind: ShaderKind,
    cull: CullMode,
    viewport: Option<(u32, u32)>,
    vertices: Range<u64>,
    vertex_count: u32,
    uniform_offset: u32,
    color_texture: Option<TextureId>,
    shadow_texture: Option<TextureId>,
}

#[derive(Debug)]
struct PassRecord {
    framebuffer: Option<FramebufferId>,
    clear_color: Option<ColorRgba>,
    clear_depth: bool,
    draws: Vec<DrawRecord>,
}

impl PassRecord {
    fn new(framebuffer: Option<FramebufferId>) -> Self {
        Self { framebuffer, clear_color: None, clear_depth: false, draws: Vec::new() }
    }

    fn is_untouched(&self) -> bool {
        self.draws.is_empty() && self.clear_color.is_none() && !self.clear_depth
    }

    fn target(&self) -> Target {
        match self.framebuffer {
            Some(_) => Target::Shadow,
            None => Target::Surface,
        }
    }
}

#[derive(Debug, Default)]
struct FrameRecord {
    passes: Vec<PassRecord>,
    vertices: Vec<f32>,
    uniforms: Vec<u8>,
}

// ============================================================================
// GPU resources
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TextureKind {
    Color,
    Depth,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    kind: TextureKind,
}

struct DepthTarget {
    view: wgpu::TextureView,
    size: u32,
}

/// CPU copy of a vertex buffer; its contents are snapshotted per draw.
struct CpuBuffer {
    layout: VertexLayout,
    capacity: usize,
    data: Vec<f32>,
}

struct Arena {
    buffer: wgpu::Buffer,
    capacity: u64,
}

/// Grows `slot` to hold `needed` bytes. Returns true when a new buffer was made.
fn ensure_arena(
    device: &wgpu::Device,
    slot: &mut Option<Arena>,
    needed: u64,
    usage: wgpu::BufferUsages,
    label: &str,
) -> bool {
    if slot.as_ref().is_some_and(|arena| arena.capacity >= needed) {
        return false;
    }
    let capacity = needed.next_power_of_two().max(MIN_ARENA_BYTES);
    log::debug!("growing {label} to {capacity} bytes");
    *slot = Some(Arena {
        buffer: device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }),
        capacity,
    });
    true
}

struct Layouts {
    uniforms: wgpu::BindGroupLayout,
    texture: wgpu::BindGroupLayout,
    shadow: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let shadow = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        Self { uniforms, texture, shadow }
    }
}

struct Modules {
    lit: wgpu::ShaderModule,
    depth: wgpu::ShaderModule,
    overlay: wgpu::ShaderModule,
}

impl Modules {
    fn new(device: &wgpu::Device) -> Self {
        let load = |label: &str, source: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        Self {
            lit: load("lit shader", include_str!("shaders/lit.wgsl")),
            depth: load("depth shader", include_str!("shaders/depth.wgsl")),
            overlay: load("overlay shader", include_str!("shaders/overlay.wgsl")),
        }
    }

    fn get(&self, kind: ShaderKind) -> &wgpu::ShaderModule {
        match kind {
            ShaderKind::Lit => &self.lit,
            ShaderKind::Depth => &self.depth,
            ShaderKind::Overlay => &self.overlay,
        }
    }
}

/// One bind group per program kind over the shared uniform arena.
struct UniformGroups {
    lit: wgpu::BindGroup,
    depth: wgpu::BindGroup,
    overlay: wgpu::BindGroup,
}

impl UniformGroups {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, buffer: &wgpu::Buffer) -> Self {
        let group = |label: &str, size: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(size as u64),
                    }),
                }],
            })
        };
        Self {
            lit: group("lit uniforms", std::mem::size_of::<LitUniforms>()),
            depth: group("depth uniforms", std::mem::size_of::<DepthUniforms>()),
            overlay: group("overlay uniforms", std::mem::size_of::<OverlayUniforms>()),
        }
    }

    fn get(&self, kind: ShaderKind) -> &wgpu::BindGroup {
        match kind {
            ShaderKind::Lit => &self.lit,
            ShaderKind::Depth => &self.depth,
            ShaderKind::Overlay => &self.overlay,
        }
    }
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

fn face(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Back => Some(wgpu::Face::Back),
        CullMode::Front => Some(wgpu::Face::Front),
    }
}

#[derive(Debug, Default)]
struct BindState {
    shader: Option<ShaderId>,
    textures: BTreeMap<TextureUnit, TextureId>,
    framebuffer: Option<FramebufferId>,
    viewport: Option<(u32, u32)>,
    cull: CullMode,
}

// ============================================================================
// Backend
// ============================================================================

pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,

    layouts: Layouts,
    modules: Modules,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_align: usize,

    // destroyed slots stay `None`; handles are never reused
    shaders: Vec<Option<(ShaderKind, UniformSet)>>,
    buffers: HashMap<BufferId, CpuBuffer>,
    next_buffer: u32,
    textures: Vec<Option<GpuTexture>>,
    framebuffers: Vec<Option<DepthTarget>>,
    white: TextureId,
    no_shadow: TextureId,

    state: BindState,
    frame: FrameRecord,
    vertex_arena: Option<Arena>,
    uniform_arena: Option<Arena>,
    uniform_groups: Option<UniformGroups>,
}

impl WgpuBackend {
    /// Acquires an adapter and device for `window` and configures its surface.
    pub async fn new(window: Arc<Window>, present_mode: wgpu::PresentMode) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GfxError::AdapterRequestFailed)?;
        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("scenegfx device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(GfxError::AdapterRequestFailed)?;
        let present_mode = if caps.present_modes.contains(&present_mode) {
            present_mode
        } else {
            log::warn!("{present_mode:?} unsupported, falling back to Fifo");
            wgpu::PresentMode::Fifo
        };

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_texture(&device, config.width, config.height, "main depth")
            .create_view(&wgpu::TextureViewDescriptor::default());
        let layouts = Layouts::new(&device);
        let modules = Modules::new(&device);
        let uniform_align = device.limits().min_uniform_buffer_offset_alignment as usize;

        let mut backend = Self {
            window,
            surface,
            adapter,
            device,
            queue,
            config,
            depth_view,
            layouts,
            modules,
            pipelines: HashMap::new(),
            uniform_align,
            shaders: Vec::new(),
            buffers: HashMap::new(),
            next_buffer: 0,
            textures: Vec::new(),
            framebuffers: Vec::new(),
            white: TextureId(0),
            no_shadow: TextureId(0),
            state: BindState::default(),
            frame: FrameRecord::default(),
            vertex_arena: None,
            uniform_arena: None,
            uniform_groups: None,
        };

        let white = TextureImage::new(1, 1, PixelFormat::Rgba8, vec![255; 4])?;
        backend.white = backend.create_texture(&white)?;
        backend.no_shadow = backend.create_depth_target(1)?.1;
        Ok(backend)
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.configure_surface();
    }

    fn configure_surface(&mut self) {
        let caps = self.surface.get_capabilities(&self.adapter);
        if let Some(&alpha) = caps.alpha_modes.first() {
            self.config.alpha_mode = alpha;
        }
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, self.config.width, self.config.height, "main depth")
            .create_view(&wgpu::TextureViewDescriptor::default());
    }

    fn push_texture(&mut self, texture: wgpu::Texture, bind_group: wgpu::BindGroup, kind: TextureKind) -> TextureId {
        self.textures.push(Some(GpuTexture { _texture: texture, bind_group, kind }));
        TextureId(self.textures.len() as u32 - 1)
    }

    fn bound_texture(&self, uniforms: &UniformSet, unit_uniform: &str) -> Option<TextureId> {
        let unit = uniforms.unit(unit_uniform)?;
        self.state.textures.get(&unit).copied()
    }

    fn current_pass(&mut self) -> &mut PassRecord {
        let framebuffer = self.state.framebuffer;
        if self.frame.passes.last().map_or(true, |p| p.framebuffer != framebuffer) {
            self.frame.passes.push(PassRecord::new(framebuffer));
        }
        let last = self.frame.passes.len() - 1;
        &mut self.frame.passes[last]
    }

    /// Uploads the recorded frame and replays it onto the next surface image.
    /// A lost or outdated surface is reconfigured and the frame is dropped.
    pub fn present(&mut self) -> Result<()> {
        let frame = std::mem::take(&mut self.frame);
        if frame.passes.is_empty() {
            return Ok(());
        }
        self.upload(&frame);
        self.prepare_pipelines(&frame);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated; reconfiguring");
                self.configure_surface();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timeout; frame skipped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });
        for pass in &frame.passes {
            self.encode_pass(&mut encoder, &view, pass)?;
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn upload(&mut self, frame: &FrameRecord) {
        let vertices: &[u8] = bytemuck::cast_slice(&frame.vertices);
        if !vertices.is_empty() {
            ensure_arena(
                &self.device,
                &mut self.vertex_arena,
                vertices.len() as u64,
                wgpu::BufferUsages::VERTEX,
                "vertex arena",
            );
            if let Some(arena) = &self.vertex_arena {
                self.queue.write_buffer(&arena.buffer, 0, vertices);
            }
        }

        if !frame.uniforms.is_empty() {
            let grew = ensure_arena(
                &self.device,
                &mut self.uniform_arena,
                frame.uniforms.len() as u64,
                wgpu::BufferUsages::UNIFORM,
                "uniform arena",
            );
            if let Some(arena) = &self.uniform_arena {
                if grew || self.uniform_groups.is_none() {
                    self.uniform_groups = Some(UniformGroups::new(&self.device, &self.layouts.uniforms, &arena.buffer));
                }
                self.queue.write_buffer(&arena.buffer, 0, &frame.uniforms);
            }
        }
    }

    fn prepare_pipelines(&mut self, frame: &FrameRecord) {
        for pass in &frame.passes {
            let target = pass.target();
            for draw in &pass.draws {
                let key = (draw.kind, draw.cull, target);
                if !self.pipelines.contains_key(&key) {
                    let pipeline = self.create_pipeline(key);
                    self.pipelines.insert(key, pipeline);
                }
            }
        }
    }

    fn create_pipeline(&self, (kind, cull, target): PipelineKey) -> wgpu::RenderPipeline {
        log::debug!("building {kind:?} pipeline (cull {cull:?}, {target:?})");
        let l = &self.layouts;
        let groups: Vec<&wgpu::BindGroupLayout> = match kind {
            ShaderKind::Lit => vec![&l.uniforms, &l.texture, &l.shadow],
            ShaderKind::Depth => vec![&l.uniforms],
            ShaderKind::Overlay => vec![&l.uniforms, &l.texture],
        };
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline layout"),
            bind_group_layouts: &groups,
            push_constant_ranges: &[],
        });

        let vertex_layout = kind.vertex_layout();
        let attributes: &[wgpu::VertexAttribute] = match vertex_layout {
            VertexLayout::Mesh => &MESH_ATTRIBUTES,
            VertexLayout::Overlay => &OVERLAY_ATTRIBUTES,
        };
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: (vertex_layout.width() * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }];

        let module = self.modules.get(kind);
        let color_targets = [Some(wgpu::ColorTargetState {
            format: self.config.format,
            blend: Some(match kind {
                ShaderKind::Overlay => wgpu::BlendState::ALPHA_BLENDING,
                _ => wgpu::BlendState::REPLACE,
            }),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let fragment = match target {
            Target::Surface => Some(wgpu::FragmentState {
                module,
                entry_point: "fs_main",
                targets: &color_targets,
            }),
            Target::Shadow => None,
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: "vs_main",
                buffers: &buffers,
            },
            fragment,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: face(cull),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: match kind {
                    ShaderKind::Overlay => wgpu::CompareFunction::LessEqual,
                    _ => wgpu::CompareFunction::Less,
                },
                stencil: wgpu::StencilState::default(),
                bias: match target {
                    Target::Shadow => wgpu::DepthBiasState { constant: 2, slope_scale: 2.0, clamp: 0.0 },
                    Target::Surface => wgpu::DepthBiasState::default(),
                },
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }

    fn texture(&self, id: TextureId) -> Option<&GpuTexture> {
        self.textures.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn shader(&self, id: ShaderId) -> Option<&(ShaderKind, UniformSet)> {
        self.shaders.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// The bind group of `texture` if it is live and of the right kind,
    /// else of `fallback`.
    fn texture_group(&self, texture: Option<TextureId>, kind: TextureKind, fallback: TextureId) -> Option<&wgpu::BindGroup> {
        texture
            .and_then(|id| self.texture(id))
            .filter(|t| t.kind == kind)
            .or_else(|| self.texture(fallback))
            .map(|t| &t.bind_group)
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        pass: &PassRecord,
    ) -> Result<()> {
        let (color_view, depth_view, full) = match pass.framebuffer {
            None => (Some(surface_view), &self.depth_view, (self.config.width, self.config.height)),
            Some(fb) => {
                let Some(target) = self.framebuffers.get(fb.0 as usize).and_then(Option::as_ref) else {
                    log::warn!("framebuffer {fb:?} destroyed before present; pass skipped");
                    return Ok(());
                };
                (None, &target.view, (target.size, target.size))
            }
        };
        let target = pass.target();

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_view
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match pass.clear_color {
                            Some(color) => wgpu::LoadOp::Clear(color.into()),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .into_iter()
            .collect();

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(match target {
                Target::Surface => "color pass",
                Target::Shadow => "shadow pass",
            }),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: if pass.clear_depth {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let (Some(groups), Some(arena)) = (&self.uniform_groups, &self.vertex_arena) else {
            return Ok(());
        };

        for draw in &pass.draws {
            let Some(pipeline) = self.pipelines.get(&(draw.kind, draw.cull, target)) else {
                continue;
            };
            let (width, height) = draw.viewport.unwrap_or(full);
            let (width, height) = (width.min(full.0), height.min(full.1));
            if width == 0 || height == 0 {
                continue;
            }
            let color = self.texture_group(draw.color_texture, TextureKind::Color, self.white);
            let shadow = self.texture_group(draw.shadow_texture, TextureKind::Depth, self.no_shadow);
            let textures = match draw.kind {
                ShaderKind::Lit => color.zip(shadow).map(|(c, s)| vec![c, s]),
                ShaderKind::Overlay => color.map(|c| vec![c]),
                ShaderKind::Depth => Some(Vec::new()),
            };
            let Some(textures) = textures else {
                log::warn!("default textures missing; {:?} draw skipped", draw.kind);
                continue;
            };

            rpass.set_pipeline(pipeline);
            rpass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            rpass.set_bind_group(0, groups.get(draw.kind), &[draw.uniform_offset]);
            for (index, group) in (1u32..).zip(textures) {
                rpass.set_bind_group(index, group, &[]);
            }
            rpass.set_vertex_buffer(0, arena.buffer.slice(draw.vertices.clone()));
            rpass.draw(0..draw.vertex_count, 0..1);
        }
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn create_shader(&mut self, kind: ShaderKind) -> Result<ShaderId> {
        self.shaders.push(Some((kind, UniformSet::default())));
        Ok(ShaderId(self.shaders.len() as u32 - 1))
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        if self.shaders.get_mut(shader.0 as usize).and_then(Option::take).is_none() {
            log::warn!("destroy of unknown shader {shader:?}");
        }
        if self.state.shader == Some(shader) {
            self.state.shader = None;
        }
    }

    fn use_shader(&mut self, shader: ShaderId) -> Result<()> {
        if self.shader(shader).is_none() {
            return Err(GfxError::UnknownShader(shader));
        }
        self.state.shader = Some(shader);
        Ok(())
    }

    fn set_uniform(&mut self, shader: ShaderId, name: &str, value: UniformValue) -> Result<()> {
        let (kind, uniforms) = self
            .shaders
            .get_mut(shader.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(GfxError::UnknownShader(shader))?;
        if !known_uniforms(*kind).contains(&name) {
            log::debug!("{kind:?} program has no uniform {name:?}; ignored");
            return Ok(());
        }
        uniforms.0.insert(name.to_owned(), value);
        Ok(())
    }

    fn create_vertex_buffer(&mut self, layout: VertexLayout, capacity: usize) -> Result<BufferId> {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, CpuBuffer { layout, capacity, data: Vec::with_capacity(capacity) });
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
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId> {
        // single-channel images are glyph coverage; everything else goes up as RGBA
        let (format, pixels, channels, address_mode) = match image.format {
            PixelFormat::R8 => (
                wgpu::TextureFormat::R8Unorm,
                Cow::Borrowed(image.pixels.as_slice()),
                1,
                wgpu::AddressMode::ClampToEdge,
            ),
            _ => (
                wgpu::TextureFormat::Rgba8UnormSrgb,
                Cow::Owned(image.to_rgba8()),
                4,
                wgpu::AddressMode::Repeat,
            ),
        };
        let size = wgpu::Extent3d { width: image.width, height: image.height, depth_or_array_layers: 1 };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.width * channels),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture bind group"),
            layout: &self.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
            ],
        });
        Ok(self.push_texture(texture, bind_group, TextureKind::Color))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if texture == self.white || texture == self.no_shadow {
            log::warn!("refusing to destroy built-in texture {texture:?}");
            return;
        }
        if self.textures.get_mut(texture.0 as usize).and_then(Option::take).is_none() {
            log::warn!("destroy of unknown texture {texture:?}");
        }
        self.state.textures.retain(|_, bound| *bound != texture);
    }

    fn create_depth_target(&mut self, size: u32) -> Result<(FramebufferId, TextureId)> {
        let texture = create_depth_texture(&self.device, size, size, "shadow map");
        let attachment = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampled = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow bind group"),
            layout: &self.layouts.shadow,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&sampled) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&sampler) },
            ],
        });
        let texture = self.push_texture(texture, bind_group, TextureKind::Depth);
        self.framebuffers.push(Some(DepthTarget { view: attachment, size }));
        Ok((FramebufferId(self.framebuffers.len() as u32 - 1), texture))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.get_mut(framebuffer.0 as usize).and_then(Option::take).is_none() {
            log::warn!("destroy of unknown framebuffer {framebuffer:?}");
        }
        if self.state.framebuffer == Some(framebuffer) {
            self.state.framebuffer = None;
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureId) -> Result<()> {
        if self.texture(texture).is_none() {
            return Err(GfxError::UnknownTexture(texture));
        }
        self.state.textures.insert(unit, texture);
        Ok(())
    }

    fn bind_framebuffer(&mut self, target: Option<FramebufferId>) -> Result<()> {
        if let Some(fb) = target {
            if !self.framebuffers.get(fb.0 as usize).is_some_and(Option::is_some) {
                return Err(GfxError::UnknownFramebuffer(fb));
            }
        }
        self.state.framebuffer = target;
        if let Some(last) = self.frame.passes.last_mut() {
            if last.is_untouched() {
                last.framebuffer = target;
            }
        }
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.state.viewport = Some((width, height));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.state.cull = mode;
    }

    fn clear(&mut self, color: Option<ColorRgba>, depth: bool) {
        if self.current_pass().draws.is_empty() {
            let pass = self.current_pass();
            pass.clear_color = color.or(pass.clear_color);
            pass.clear_depth |= depth;
        } else {
            let mut pass = PassRecord::new(self.state.framebuffer);
            pass.clear_color = color;
            pass.clear_depth = depth;
            self.frame.passes.push(pass);
        }
    }

    fn draw(&mut self, buffer: BufferId, vertex_count: u32) -> Result<()> {
        let Some(shader) = self.state.shader else {
            log::warn!("draw without a program; skipped");
            return Ok(());
        };
        let (kind, uniforms) = self
            .shaders
            .get(shader.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(GfxError::UnknownShader(shader))?;
        let kind = *kind;
        let buf = self.buffers.get(&buffer).ok_or(GfxError::UnknownBuffer(buffer))?;
        let needed = vertex_count as usize * buf.layout.width();
        if needed > buf.data.len() {
            return Err(GfxError::BufferOverflow { needed, capacity: buf.data.len() });
        }
        if kind.vertex_layout() != buf.layout {
            log::warn!("{kind:?} program cannot draw a {:?} buffer; skipped", buf.layout);
            return Ok(());
        }
        if vertex_count == 0 {
            return Ok(());
        }

        let (color_texture, shadow_texture) = match kind {
            ShaderKind::Lit => (
                uniforms
                    .flag("material.useDiffuseMap")
                    .then(|| self.bound_texture(uniforms, "material.diffuseMap"))
                    .flatten(),
                uniforms
                    .flag("useShadows")
                    .then(|| self.bound_texture(uniforms, "shadowMap"))
                    .flatten(),
            ),
            ShaderKind::Overlay => (
                uniforms.flag("useTex").then(|| self.bound_texture(uniforms, "tex")).flatten(),
                None,
            ),
            ShaderKind::Depth => (None, None),
        };

        let start = (self.frame.vertices.len() * std::mem::size_of::<f32>()) as u64;
        self.frame.vertices.extend_from_slice(&buf.data[..needed]);
        let end = (self.frame.vertices.len() * std::mem::size_of::<f32>()) as u64;

        let packed = uniforms.pack(kind);
        let offset = self.frame.uniforms.len().next_multiple_of(self.uniform_align);
        self.frame.uniforms.resize(offset, 0);
        self.frame.uniforms.extend_from_slice(&packed);

        let record = DrawRecord {
            kind,
            cull: self.state.cull,
            viewport: self.state.viewport,
            vertices: start..end,
            vertex_count,
            uniform_offset: offset as u32,
            color_texture,
            shadow_texture,
        };
        self.current_pass().draws.push(record);
        Ok(())
    }
}
