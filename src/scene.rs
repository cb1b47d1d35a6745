//! The scene: registries, the two-pass 3D render and immediate-mode 2D drawing.
//!
//! A [`Scene`] owns its render objects and cameras, keyed by ids that are
//! handed out from per-collection counters and never reused. It holds at most
//! one directional light and, once configured, one shadow map. The scene does
//! not own a backend; every operation that talks to the GPU borrows one.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Mat4, Vec2};

use crate::backend::{BufferId, CullMode, RenderBackend, ShaderId, ShaderKind, TextureId, VertexLayout};
use crate::camera::Camera;
use crate::color::ColorRgba;
use crate::config::SceneConfig;
use crate::error::{GfxError, Result};
use crate::font::GlyphSource;
use crate::light::DirectionalLight;
use crate::overlay::{self, TextLayout, OVERLAY_VERTEX_WIDTH};
use crate::render_object::{DrawParams, RenderObject};
use crate::shadow::{OriginShadowFrustum, ShadowFrustum, ShadowMap};
use crate::texture::{TextureUnit, TextureUnits};

/// Depth range of the 2D projection.
const OVERLAY_Z_RANGE: f32 = 1000.0;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CameraId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Draws issued by one [`Scene::render`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub shadow_draws: usize,
    pub color_draws: usize,
}

#[derive(Debug)]
struct Overlay {
    shader: ShaderId,
    buffer: BufferId,
    proj: Mat4,
    depth: f32,
}

#[derive(Debug)]
pub struct Scene {
    config: SceneConfig,

    objects: BTreeMap<ObjectId, RenderObject>,
    next_object: u64,
    cameras: BTreeMap<CameraId, Camera>,
    next_camera: u64,
    active_camera: Option<CameraId>,
    light: Option<DirectionalLight>,

    frustum: Box<dyn ShadowFrustum>,
    shadow_map: Option<ShadowMap>,
    shadows_enabled: bool,

    units: TextureUnits,
    overlay_unit: TextureUnit,
    diffuse_unit: TextureUnit,
    shadow_unit: TextureUnit,

    overlay: Overlay,
    window: Option<(u32, u32)>,
    retired: Vec<BufferId>,
}

impl Scene {
    pub fn new(gfx: &mut impl RenderBackend) -> Result<Self> {
        Self::with_config(gfx, SceneConfig::default())
    }

    /// Creates the overlay program and the shared 2D vertex buffer, and
    /// reserves the texture units the scene binds to.
    pub fn with_config(gfx: &mut impl RenderBackend, config: SceneConfig) -> Result<Self> {
        let mut units = TextureUnits::default();
        let overlay_unit = units.allocate()?;
        let diffuse_unit = units.allocate()?;
        let shadow_unit = units.allocate()?;

        let overlay = Overlay {
            shader: gfx.create_shader(ShaderKind::Overlay)?,
            buffer: gfx.create_vertex_buffer(VertexLayout::Overlay, config.overlay_capacity)?,
            proj: Mat4::IDENTITY,
            depth: config.depth_start,
        };

        Ok(Self {
            frustum: Box::new(OriginShadowFrustum::from_config(&config)),
            config,
            objects: BTreeMap::new(),
            next_object: 0,
            cameras: BTreeMap::new(),
            next_camera: 0,
            active_camera: None,
            light: None,
            shadow_map: None,
            shadows_enabled: false,
            units,
            overlay_unit,
            diffuse_unit,
            shadow_unit,
            overlay,
            window: None,
            retired: Vec::new(),
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn texture_units(&self) -> &TextureUnits {
        &self.units
    }

    /// Unit the shadow map is sampled from during the color pass.
    pub fn shadow_unit(&self) -> TextureUnit {
        self.shadow_unit
    }

    // ========================================================================
    // Render objects
    // ========================================================================

    pub fn add_render_object(&mut self, object: RenderObject) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(id, object);
        log::debug!("added render object {id}");
        id
    }

    /// Removes an object and hands it back. Its backend buffer is released
    /// at the start of the next frame; the object re-uploads if added again.
    pub fn remove_render_object(&mut self, id: ObjectId) -> Result<RenderObject> {
        let mut object = self.objects.remove(&id).ok_or(GfxError::UnknownObject(id))?;
        self.retired.extend(object.take_buffer());
        Ok(object)
    }

    pub fn render_object(&self, id: ObjectId) -> Result<&RenderObject> {
        self.objects.get(&id).ok_or(GfxError::UnknownObject(id))
    }

    pub fn render_object_mut(&mut self, id: ObjectId) -> Result<&mut RenderObject> {
        self.objects.get_mut(&id).ok_or(GfxError::UnknownObject(id))
    }

    /// Objects in insertion order.
    pub fn render_objects(&self) -> impl Iterator<Item = (ObjectId, &RenderObject)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    // ========================================================================
    // Cameras
    // ========================================================================

    pub fn add_camera(&mut self, camera: Camera) -> CameraId {
        let id = CameraId(self.next_camera);
        self.next_camera += 1;
        self.cameras.insert(id, camera);
        id
    }

    /// Removing the active camera leaves the scene without one.
    pub fn remove_camera(&mut self, id: CameraId) -> Result<Camera> {
        let camera = self.cameras.remove(&id).ok_or(GfxError::UnknownCamera(id))?;
        if self.active_camera == Some(id) {
            self.active_camera = None;
        }
        Ok(camera)
    }

    pub fn camera(&self, id: CameraId) -> Result<&Camera> {
        self.cameras.get(&id).ok_or(GfxError::UnknownCamera(id))
    }

    pub fn camera_mut(&mut self, id: CameraId) -> Result<&mut Camera> {
        self.cameras.get_mut(&id).ok_or(GfxError::UnknownCamera(id))
    }

    pub fn set_active_camera(&mut self, id: CameraId) -> Result<()> {
        if !self.cameras.contains_key(&id) {
            return Err(GfxError::UnknownCamera(id));
        }
        self.active_camera = Some(id);
        Ok(())
    }

    pub fn active_camera_id(&self) -> Option<CameraId> {
        self.active_camera
    }

    pub fn active_camera(&self) -> Option<&Camera> {
        self.active_camera.and_then(|id| self.cameras.get(&id))
    }

    pub fn active_camera_mut(&mut self) -> Option<&mut Camera> {
        self.active_camera.and_then(|id| self.cameras.get_mut(&id))
    }

    // ========================================================================
    // Light and shadows
    // ========================================================================

    /// Replaces the light. A configured shadow map is refitted to it.
    pub fn set_directional_light(&mut self, light: DirectionalLight) {
        if let Some(map) = &mut self.shadow_map {
            map.fit(self.frustum.as_ref(), light.direction);
        }
        self.light = Some(light);
    }

    pub fn directional_light(&self) -> Option<&DirectionalLight> {
        self.light.as_ref()
    }

    pub fn set_shadow_frustum(&mut self, frustum: Box<dyn ShadowFrustum>) {
        self.frustum = frustum;
        if let (Some(map), Some(light)) = (&mut self.shadow_map, &self.light) {
            map.fit(self.frustum.as_ref(), light.direction);
        }
    }

    /// Allocates the shadow map and enables the shadow pass. Needs a light.
    pub fn setup_shadows(&mut self, gfx: &mut impl RenderBackend) -> Result<()> {
        let Some(light) = self.light else {
            log::warn!("setup_shadows called before a directional light was set");
            return Err(GfxError::MissingLight);
        };
        if self.shadow_map.is_none() {
            self.shadow_map = Some(ShadowMap::create(gfx, self.config.shadow_map_size)?);
        }
        if let Some(map) = &mut self.shadow_map {
            map.fit(self.frustum.as_ref(), light.direction);
        }
        self.shadows_enabled = true;
        Ok(())
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled && self.shadow_map.is_none() {
            return Err(GfxError::ShadowsNotConfigured);
        }
        self.shadows_enabled = enabled;
        Ok(())
    }

    pub fn shadows_enabled(&self) -> bool {
        self.shadows_enabled
    }

    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Recomputes the 2D projection: origin at the bottom left, one unit per
    /// pixel.
    pub fn set_window_dimensions(&mut self, width: u32, height: u32) {
        self.window = Some((width, height));
        self.overlay.proj = Mat4::orthographic_rh(
            0.0,
            width as f32,
            0.0,
            height as f32,
            -OVERLAY_Z_RANGE,
            OVERLAY_Z_RANGE,
        );
    }

    pub fn window_dimensions(&self) -> Option<(u32, u32)> {
        self.window
    }

    /// Window resize: new 2D projection, new aspect for perspective cameras.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.set_window_dimensions(width, height);
        if width == 0 || height == 0 {
            return Ok(());
        }
        let aspect = width as f32 / height as f32;
        for camera in self.cameras.values_mut() {
            camera.set_aspect_ratio(aspect)?;
        }
        Ok(())
    }

    /// Clears the window target and resets the 2D depth counter.
    pub fn begin_frame(&mut self, gfx: &mut impl RenderBackend, clear: ColorRgba) -> Result<()> {
        self.release_retired(gfx);
        gfx.bind_framebuffer(None)?;
        gfx.clear(Some(clear), true);
        self.reset_depth();
        Ok(())
    }

    fn release_retired(&mut self, gfx: &mut impl RenderBackend) {
        for buffer in self.retired.drain(..) {
            gfx.destroy_buffer(buffer);
        }
    }

    /// Frees every backend resource the scene created: object buffers, the
    /// overlay program and buffer, and the shadow map. Programs and textures
    /// handed in by the caller are left alone.
    pub fn release(mut self, gfx: &mut impl RenderBackend) {
        self.release_retired(gfx);
        for object in self.objects.values_mut() {
            object.release(gfx);
        }
        gfx.destroy_buffer(self.overlay.buffer);
        gfx.destroy_shader(self.overlay.shader);
        if let Some(map) = self.shadow_map.take() {
            map.release(gfx);
        }
        log::debug!("scene released ({} objects)", self.objects.len());
    }

    /// Runs the shadow pass when enabled, then the color pass.
    ///
    /// Without an active camera or a light the color pass is skipped; that is
    /// a valid state, not an error.
    pub fn render(&mut self, gfx: &mut impl RenderBackend) -> Result<FrameStats> {
        self.release_retired(gfx);
        let mut stats = FrameStats::default();

        let shadow = match (&self.shadow_map, self.shadows_enabled && self.light.is_some()) {
            (Some(map), true) => Some(map.clone()),
            _ => None,
        };

        if let Some(map) = &shadow {
            gfx.bind_framebuffer(Some(map.framebuffer))?;
            gfx.set_viewport(map.size, map.size);
            gfx.set_cull_mode(CullMode::None);
            gfx.clear(None, true);
            let params = DrawParams {
                view: map.view,
                proj: map.proj,
                light_space: map.light_space(),
                override_shader: Some(map.depth_shader),
                diffuse_unit: self.diffuse_unit,
            };
            for object in self.objects.values_mut() {
                if object.draw(gfx, &params)? {
                    stats.shadow_draws += 1;
                }
            }
            gfx.bind_framebuffer(None)?;
        }

        gfx.set_cull_mode(CullMode::Back);
        if let Some((width, height)) = self.window {
            gfx.set_viewport(width, height);
        }

        let (Some(camera), Some(light)) = (self.active_camera(), self.light) else {
            log::trace!("no active camera or light; color pass skipped");
            return Ok(stats);
        };
        let (view, proj, eye) = (camera.view_matrix(), camera.proj_matrix(), camera.position());

        light.bind(gfx, eye)?;
        if let Some(map) = &shadow {
            gfx.bind_texture(self.shadow_unit, map.texture)?;
            gfx.set_uniform(light.shader, "shadowMap", self.shadow_unit.into())?;
        }
        gfx.set_uniform(light.shader, "useShadows", shadow.is_some().into())?;

        let params = DrawParams {
            view,
            proj,
            light_space: shadow.as_ref().map_or(Mat4::IDENTITY, ShadowMap::light_space),
            override_shader: None,
            diffuse_unit: self.diffuse_unit,
        };
        for object in self.objects.values_mut() {
            if object.draw(gfx, &params)? {
                stats.color_draws += 1;
            }
        }
        Ok(stats)
    }

    // ========================================================================
    // 2D drawing
    // ========================================================================

    /// Depth the next 2D draw will use.
    pub fn depth(&self) -> f32 {
        self.overlay.depth
    }

    pub fn reset_depth(&mut self) {
        self.overlay.depth = self.config.depth_start;
    }

    fn begin_overlay(
        &mut self,
        gfx: &mut impl RenderBackend,
        color: ColorRgba,
        texture: Option<TextureId>,
    ) -> Result<()> {
        let Some((width, height)) = self.window else {
            return Err(GfxError::ViewportNotSet);
        };
        let shader = self.overlay.shader;
        gfx.bind_framebuffer(None)?;
        gfx.set_viewport(width, height);
        gfx.set_cull_mode(CullMode::None);
        gfx.use_shader(shader)?;
        gfx.set_uniform(shader, "transform", self.overlay.proj.into())?;
        gfx.set_uniform(shader, "color", color.into())?;
        gfx.set_uniform(shader, "drawDepth", self.overlay.depth.into())?;
        gfx.set_uniform(shader, "useTex", texture.is_some().into())?;
        if let Some(texture) = texture {
            self.bind_overlay_texture(gfx, texture)?;
        }
        Ok(())
    }

    fn bind_overlay_texture(&mut self, gfx: &mut impl RenderBackend, texture: TextureId) -> Result<()> {
        gfx.bind_texture(self.overlay_unit, texture)?;
        gfx.set_uniform(self.overlay.shader, "tex", self.overlay_unit.into())
    }

    /// Uploads and draws, splitting data larger than the shared buffer into
    /// whole-triangle chunks.
    fn submit(&mut self, gfx: &mut impl RenderBackend, vertices: &[f32]) -> Result<()> {
        let triangle = 3 * OVERLAY_VERTEX_WIDTH;
        let chunk = self.config.overlay_capacity - self.config.overlay_capacity % triangle;
        if chunk == 0 {
            return Err(GfxError::BufferOverflow { needed: triangle, capacity: self.config.overlay_capacity });
        }
        for part in vertices.chunks(chunk) {
            gfx.write_vertices(self.overlay.buffer, part)?;
            gfx.draw(self.overlay.buffer, (part.len() / OVERLAY_VERTEX_WIDTH) as u32)?;
        }
        Ok(())
    }

    fn draw_solid(&mut self, gfx: &mut impl RenderBackend, color: ColorRgba, vertices: &[f32]) -> Result<()> {
        self.begin_overlay(gfx, color, None)?;
        self.submit(gfx, vertices)?;
        self.overlay.depth += self.config.depth_step;
        Ok(())
    }

    pub fn draw_rectangle(&mut self, gfx: &mut impl RenderBackend, color: ColorRgba, p1: Vec2, p2: Vec2) -> Result<()> {
        self.draw_solid(gfx, color, &overlay::rectangle(p1, p2))
    }

    pub fn draw_circle(&mut self, gfx: &mut impl RenderBackend, color: ColorRgba, center: Vec2, radius: f32) -> Result<()> {
        let vertices = overlay::circle(center, radius, self.config.circle_segments);
        self.draw_solid(gfx, color, &vertices)
    }

    pub fn draw_circle_outline(
        &mut self,
        gfx: &mut impl RenderBackend,
        color: ColorRgba,
        center: Vec2,
        radius: f32,
        thickness: f32,
    ) -> Result<()> {
        let vertices = overlay::circle_outline(center, radius, thickness, self.config.circle_segments);
        self.draw_solid(gfx, color, &vertices)
    }

    pub fn draw_line(
        &mut self,
        gfx: &mut impl RenderBackend,
        color: ColorRgba,
        p1: Vec2,
        p2: Vec2,
        thickness: f32,
    ) -> Result<()> {
        self.draw_solid(gfx, color, &overlay::line(p1, p2, thickness))
    }

    pub fn draw_multi_line(
        &mut self,
        gfx: &mut impl RenderBackend,
        color: ColorRgba,
        points: &[Vec2],
        thickness: f32,
    ) -> Result<()> {
        self.draw_solid(gfx, color, &overlay::polyline(points, thickness))
    }

    pub fn draw_arrow(
        &mut self,
        gfx: &mut impl RenderBackend,
        color: ColorRgba,
        tail: Vec2,
        tip: Vec2,
        thickness: f32,
    ) -> Result<()> {
        self.draw_solid(gfx, color, &overlay::arrow(tail, tip, thickness))
    }

    /// Draws `text` as one textured quad per glyph, all at the same depth.
    /// A font that failed to load draws nothing.
    pub fn draw_text(
        &mut self,
        gfx: &mut impl RenderBackend,
        font: &impl GlyphSource,
        text: &str,
        color: ColorRgba,
        layout: &TextLayout,
    ) -> Result<()> {
        if !font.is_ready() {
            log::warn!("font not ready; skipping text {text:?}");
            self.overlay.depth += self.config.depth_step;
            return Ok(());
        }
        let quads = overlay::layout_text(font, text, layout)?;
        let Some(first) = quads.first() else {
            self.overlay.depth += self.config.depth_step;
            return Ok(());
        };
        self.begin_overlay(gfx, color, Some(first.texture))?;
        for quad in &quads {
            self.bind_overlay_texture(gfx, quad.texture)?;
            self.submit(gfx, &quad.vertices)?;
        }
        self.overlay.depth += self.config.depth_step;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::UniformValue;
    use crate::color::colors;
    use crate::overlay::tests::mono_font;
    use crate::recording::RecordingBackend;
    use glam::Vec3;

    fn scene() -> (RecordingBackend, Scene) {
        let mut gfx = RecordingBackend::new();
        let scene = Scene::new(&mut gfx).unwrap();
        (gfx, scene)
    }

    fn lit_cube(gfx: &mut RecordingBackend) -> RenderObject {
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        let mut obj = RenderObject::new().with_shader(lit);
        obj.gen_cube(1.0);
        obj
    }

    #[test]
    fn object_ids_are_monotonic_and_never_reused() {
        let (_, mut scene) = scene();
        let a = scene.add_render_object(RenderObject::new());
        let b = scene.add_render_object(RenderObject::new());
        scene.remove_render_object(a).unwrap();
        let c = scene.add_render_object(RenderObject::new());
        assert!(a < b && b < c);
        assert!(matches!(scene.remove_render_object(a), Err(GfxError::UnknownObject(id)) if id == a));
        assert!(scene.render_object(c).is_ok());
        assert_eq!(scene.object_count(), 2);
    }

    #[test]
    fn camera_registry() {
        let (_, mut scene) = scene();
        assert!(scene.active_camera().is_none());
        let a = scene.add_camera(Camera::new());
        let b = scene.add_camera(Camera::new());
        assert_ne!(a, b);
        scene.set_active_camera(b).unwrap();
        assert_eq!(scene.active_camera_id(), Some(b));

        scene.remove_camera(b).unwrap();
        assert!(scene.active_camera().is_none());
        assert!(matches!(scene.set_active_camera(b), Err(GfxError::UnknownCamera(_))));
        let c = scene.add_camera(Camera::new());
        assert!(c > b);
    }

    #[test]
    fn removed_object_buffer_is_released_next_frame() {
        let (mut gfx, mut scene) = scene();
        let cam = scene.add_camera(Camera::new());
        scene.set_active_camera(cam).unwrap();
        let cube = lit_cube(&mut gfx);
        let shader = cube.shader().unwrap();
        scene.set_directional_light(DirectionalLight::new(Vec3::NEG_Y, shader));
        let id = scene.add_render_object(cube);
        scene.render(&mut gfx).unwrap();
        // overlay buffer plus the cube
        assert_eq!(gfx.live_buffers(), 2);

        scene.remove_render_object(id).unwrap();
        scene.begin_frame(&mut gfx, colors::BLACK).unwrap();
        assert_eq!(gfx.live_buffers(), 1);
    }

    #[test]
    fn release_leaves_only_caller_resources() {
        let (mut gfx, mut scene) = scene();
        let cam = scene.add_camera(Camera::new());
        scene.set_active_camera(cam).unwrap();
        let cube = lit_cube(&mut gfx);
        let lit = cube.shader().unwrap();
        scene.set_directional_light(DirectionalLight::new(Vec3::NEG_Y, lit));
        scene.add_render_object(cube);
        let doomed = scene.add_render_object(lit_cube(&mut gfx));
        scene.setup_shadows(&mut gfx).unwrap();
        scene.render(&mut gfx).unwrap();
        scene.remove_render_object(doomed).unwrap();
        assert_eq!(gfx.live_framebuffers(), 1);

        scene.release(&mut gfx);
        assert_eq!(gfx.live_buffers(), 0);
        assert_eq!(gfx.live_framebuffers(), 0);
        assert_eq!(gfx.live_textures(), 0);
        // the two lit programs belong to the caller
        assert_eq!(gfx.live_shaders(), 2);
    }

    #[test]
    fn shadows_need_a_light() {
        let (mut gfx, mut scene) = scene();
        assert!(matches!(scene.setup_shadows(&mut gfx), Err(GfxError::MissingLight)));
        assert!(!scene.shadows_enabled());
        assert!(matches!(scene.set_shadows_enabled(true), Err(GfxError::ShadowsNotConfigured)));
    }

    #[test]
    fn setup_twice_reuses_the_shadow_map() {
        let (mut gfx, mut scene) = scene();
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        scene.set_directional_light(DirectionalLight::new(Vec3::NEG_Y, lit));
        scene.setup_shadows(&mut gfx).unwrap();
        let first = scene.shadow_map().unwrap().texture;
        scene.setup_shadows(&mut gfx).unwrap();
        assert_eq!(scene.shadow_map().unwrap().texture, first);
        assert_eq!(gfx.texture_size(first), Some((4096, 4096)));
    }

    #[test]
    fn changing_the_light_refits_the_shadow_frustum() {
        let (mut gfx, mut scene) = scene();
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        scene.set_directional_light(DirectionalLight::new(Vec3::NEG_Y, lit));
        scene.setup_shadows(&mut gfx).unwrap();
        let before = scene.shadow_map().unwrap().view;
        scene.set_directional_light(DirectionalLight::new(Vec3::new(1.0, -1.0, 0.0), lit));
        assert_ne!(scene.shadow_map().unwrap().view, before);
    }

    #[test]
    fn disabled_shadows_skip_the_shadow_pass() {
        let (mut gfx, mut scene) = scene();
        let cam = scene.add_camera(Camera::new());
        scene.set_active_camera(cam).unwrap();
        let cube = lit_cube(&mut gfx);
        let lit = cube.shader().unwrap();
        scene.add_render_object(cube);
        scene.set_directional_light(DirectionalLight::new(Vec3::NEG_Y, lit));
        scene.setup_shadows(&mut gfx).unwrap();
        scene.set_shadows_enabled(false).unwrap();

        let stats = scene.render(&mut gfx).unwrap();
        assert_eq!(stats, FrameStats { shadow_draws: 0, color_draws: 1 });
        let call = gfx.draws().last().unwrap();
        assert_eq!(call.uniform("useShadows"), Some(UniformValue::Bool(false)));
        assert_eq!(call.texture_at(scene.shadow_unit()), None);
    }

    #[test]
    fn color_pass_needs_camera_and_light() {
        let (mut gfx, mut scene) = scene();
        let cube = lit_cube(&mut gfx);
        let lit = cube.shader().unwrap();
        scene.add_render_object(cube);
        assert_eq!(scene.render(&mut gfx).unwrap().color_draws, 0);

        scene.set_directional_light(DirectionalLight::new(Vec3::NEG_Y, lit));
        assert_eq!(scene.render(&mut gfx).unwrap().color_draws, 0);

        let cam = scene.add_camera(Camera::new());
        scene.set_active_camera(cam).unwrap();
        assert_eq!(scene.render(&mut gfx).unwrap().color_draws, 1);
        let call = gfx.draws().last().unwrap();
        assert_eq!(call.cull, CullMode::Back);
        assert!(call.uniform("dirLight.dir").is_some());
        assert!(call.uniform("viewPos").is_some());
    }

    #[test]
    fn resize_updates_perspective_cameras() {
        let (_, mut scene) = scene();
        let mut persp = Camera::new();
        persp.set_perspective(45.0, 1.0).unwrap();
        let a = scene.add_camera(persp);
        let mut ortho = Camera::new();
        ortho.set_orthographic(10.0, 10.0).unwrap();
        let b = scene.add_camera(ortho);

        scene.resize(1600, 900).unwrap();
        assert_eq!(scene.window_dimensions(), Some((1600, 900)));
        assert_eq!(
            scene.camera(a).unwrap().projection(),
            crate::camera::Projection::Perspective { fov: 45.0, aspect: 1600.0 / 900.0 }
        );
        assert_eq!(
            scene.camera(b).unwrap().projection(),
            crate::camera::Projection::Orthographic { width: 10.0, height: 10.0 }
        );
        // minimised windows keep the last aspect
        scene.resize(0, 0).unwrap();
        assert!(matches!(
            scene.camera(a).unwrap().projection(),
            crate::camera::Projection::Perspective { aspect, .. } if aspect == 1600.0 / 900.0
        ));
    }

    #[test]
    fn two_d_needs_window_dimensions() {
        let (mut gfx, mut scene) = scene();
        let err = scene.draw_rectangle(&mut gfx, colors::RED, Vec2::ZERO, Vec2::ONE).unwrap_err();
        assert!(matches!(err, GfxError::ViewportNotSet));
    }

    #[test]
    fn each_2d_call_consumes_one_depth_unit() {
        let (mut gfx, mut scene) = scene();
        scene.set_window_dimensions(800, 600);
        assert_eq!(scene.depth(), -99.0);

        scene.draw_rectangle(&mut gfx, colors::RED, Vec2::ZERO, Vec2::splat(10.0)).unwrap();
        scene.draw_circle(&mut gfx, colors::BLUE, Vec2::splat(50.0), 10.0).unwrap();
        scene.draw_line(&mut gfx, colors::GREEN, Vec2::ZERO, Vec2::splat(5.0), 2.0).unwrap();
        scene.draw_arrow(&mut gfx, colors::WHITE, Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0).unwrap();

        let depths: Vec<f32> = gfx
            .draws()
            .iter()
            .filter_map(|d| d.uniform("drawDepth").and_then(|v| v.as_float()))
            .collect();
        assert_eq!(depths, vec![-99.0, -98.0, -97.0, -96.0]);
        assert_eq!(scene.depth(), -95.0);

        scene.reset_depth();
        assert_eq!(scene.depth(), -99.0);
    }

    #[test]
    fn overlay_draws_use_the_window_projection() {
        let (mut gfx, mut scene) = scene();
        scene.set_window_dimensions(800, 600);
        scene.draw_circle(&mut gfx, colors::RED, Vec2::new(400.0, 300.0), 20.0).unwrap();
        let call = &gfx.draws()[0];
        let transform = call.uniform("transform").and_then(|v| v.as_mat4()).unwrap();
        let centre = transform.project_point3(Vec3::new(400.0, 300.0, 0.0));
        assert!(centre.truncate().abs_diff_eq(Vec2::ZERO, 1e-5));
        assert_eq!(call.uniform("useTex"), Some(UniformValue::Bool(false)));
        assert_eq!(call.vertex_count, 300);
        assert_eq!(call.cull, CullMode::None);
    }

    #[test]
    fn oversized_polylines_are_split_across_draws() {
        let (mut gfx, mut scene) = scene();
        scene.set_window_dimensions(800, 600);
        let points: Vec<Vec2> = (0..400).map(|i| Vec2::new(i as f32, (i % 2) as f32 * 10.0)).collect();
        scene.draw_multi_line(&mut gfx, colors::RED, &points, 1.0).unwrap();

        let total: u32 = gfx.draws().iter().map(|d| d.vertex_count).sum();
        assert_eq!(total, 399 * 6);
        assert!(gfx.draws().len() > 1);
        assert!(gfx.draws().iter().all(|d| d.vertex_count % 3 == 0));
        assert!(gfx.draws().iter().all(|d| d.uniform("drawDepth") == Some(UniformValue::Float(-99.0))));
    }

    #[test]
    fn text_binds_each_glyph_texture_at_one_depth() {
        let (mut gfx, mut scene) = scene();
        scene.set_window_dimensions(800, 600);
        let font = mono_font(&mut gfx);
        scene
            .draw_text(&mut gfx, &font, "hi you", colors::WHITE, &TextLayout::at(Vec2::new(10.0, 500.0)))
            .unwrap();

        let draws = gfx.draws();
        assert_eq!(draws.len(), 5);
        let unit = TextureUnit::new(0);
        let texture_of = |ch| font.glyph(ch).and_then(|g| g.texture);
        assert_eq!(draws[0].texture_at(unit), texture_of('h'));
        assert_eq!(draws[4].texture_at(unit), texture_of('u'));
        assert!(draws.iter().all(|d| d.uniform("useTex") == Some(UniformValue::Bool(true))));
        assert!(draws.iter().all(|d| d.uniform("drawDepth") == Some(UniformValue::Float(-99.0))));
        assert_eq!(scene.depth(), -98.0);
    }

    #[test]
    fn text_with_unknown_glyph_fails_without_drawing() {
        let (mut gfx, mut scene) = scene();
        scene.set_window_dimensions(800, 600);
        let font = mono_font(&mut gfx);
        let err = scene
            .draw_text(&mut gfx, &font, "ok\u{7f}", colors::WHITE, &TextLayout::at(Vec2::ZERO))
            .unwrap_err();
        assert!(matches!(err, GfxError::MissingGlyph('\u{7f}')));
        assert!(gfx.draws().is_empty());
    }
}
