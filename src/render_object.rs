// Render objects: a mesh, its pose, and what it is drawn with

use glam::{Mat3, Mat4, Vec3};

use crate::backend::{BufferId, RenderBackend, ShaderId, VertexLayout};
use crate::error::Result;
use crate::material::Material;
use crate::math::{normal_matrix, Pose};
use crate::mesh::{self, MeshData};
use crate::texture::TextureUnit;

/// Per-pass inputs to [`RenderObject::draw`].
#[derive(Debug, Copy, Clone)]
pub struct DrawParams {
    pub view: Mat4,
    pub proj: Mat4,
    /// `light_proj · light_view`, used for the shadow-map lookup.
    pub light_space: Mat4,
    /// Set for depth-only passes; only the transform uniforms are bound.
    pub override_shader: Option<ShaderId>,
    /// Unit the diffuse map is bound to.
    pub diffuse_unit: TextureUnit,
}

#[derive(Debug, Copy, Clone)]
struct GpuBuffer {
    id: BufferId,
    capacity: usize,
}

/// A mesh with a pose, a shader handle and an optional material.
///
/// The object owns its vertex data and the backend buffer it is uploaded to.
/// Geometry is re-uploaded lazily on the next draw after it changes.
#[derive(Debug)]
pub struct RenderObject {
    pose: Pose,
    model: Mat4,
    normal: Mat3,
    mesh: MeshData,
    buffer: Option<GpuBuffer>,
    dirty: bool,
    shader: Option<ShaderId>,
    material: Option<Material>,
    warned_no_shader: bool,
}

impl Default for RenderObject {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderObject {
    pub fn new() -> Self {
        Self {
            pose: Pose::identity(),
            model: Mat4::IDENTITY,
            normal: Mat3::IDENTITY,
            mesh: MeshData::default(),
            buffer: None,
            dirty: false,
            shader: None,
            material: Some(Material::default()),
            warned_no_shader: false,
        }
    }

    pub fn with_shader(mut self, shader: ShaderId) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        self.set_mesh(mesh);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.pose.rotation
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    pub fn normal_matrix(&self) -> Mat3 {
        self.normal
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn shader(&self) -> Option<ShaderId> {
        self.shader
    }

    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer.map(|b| b.id)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.pose.position = position;
        self.recalc();
    }

    /// Euler angles in radians, composed X then Y then Z.
    pub fn set_rotation(&mut self, euler: Vec3) {
        self.pose.rotation = euler;
        self.recalc();
    }

    pub fn set_shader(&mut self, shader: ShaderId) {
        self.shader = Some(shader);
        self.warned_no_shader = false;
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = Some(material);
    }

    pub fn clear_material(&mut self) {
        self.material = None;
    }

    /// Replaces the geometry. The backend buffer is refreshed on the next draw.
    pub fn set_mesh(&mut self, mesh: MeshData) {
        self.mesh = mesh;
        self.dirty = true;
    }

    pub fn gen_sphere(&mut self, radius: f32, lat_segments: u32, lon_segments: u32) {
        self.set_mesh(mesh::sphere(radius, lat_segments, lon_segments));
    }

    pub fn gen_cube(&mut self, side: f32) {
        self.set_mesh(mesh::cube(side));
    }

    pub fn gen_torus(&mut self, major_radius: f32, minor_radius: f32, minor_segments: u32, major_segments: u32) {
        self.set_mesh(mesh::torus(major_radius, minor_radius, minor_segments, major_segments));
    }

    pub fn gen_plane(&mut self, width: f32, depth: f32) {
        self.set_mesh(mesh::plane(width, depth));
    }

    fn recalc(&mut self) {
        self.model = self.pose.matrix();
        self.normal = normal_matrix(&self.model);
    }

    /// Pushes pending geometry to the backend, growing the buffer when the
    /// new data does not fit. The old buffer is destroyed before the new one
    /// replaces it.
    pub fn upload(&mut self, gfx: &mut impl RenderBackend) -> Result<()> {
        if !self.dirty && self.buffer.is_some() {
            return Ok(());
        }
        let data = self.mesh.as_floats();
        let buffer = match self.buffer {
            Some(buffer) if buffer.capacity >= data.len() => buffer,
            stale => {
                if let Some(old) = stale {
                    gfx.destroy_buffer(old.id);
                }
                let capacity = data.len().max(VertexLayout::Mesh.width());
                let id = gfx.create_vertex_buffer(VertexLayout::Mesh, capacity)?;
                log::debug!("allocated mesh buffer {id:?} ({capacity} floats)");
                let buffer = GpuBuffer { id, capacity };
                self.buffer = Some(buffer);
                buffer
            }
        };
        gfx.write_vertices(buffer.id, data)?;
        self.dirty = false;
        Ok(())
    }

    /// Detaches the backend buffer so the caller can destroy it.
    pub(crate) fn take_buffer(&mut self) -> Option<BufferId> {
        self.dirty = true;
        self.buffer.take().map(|b| b.id)
    }

    /// Destroys the backend buffer. The object stays usable and re-uploads on
    /// its next draw.
    pub fn release(&mut self, gfx: &mut impl RenderBackend) {
        if let Some(id) = self.take_buffer() {
            gfx.destroy_buffer(id);
        }
    }

    /// Binds uniforms and issues one triangle-list draw.
    ///
    /// Returns `Ok(false)` when nothing was drawn: the object has no geometry,
    /// or no shader and no override.
    pub fn draw(&mut self, gfx: &mut impl RenderBackend, params: &DrawParams) -> Result<bool> {
        if self.mesh.vertices.is_empty() {
            return Ok(false);
        }

        if let Some(depth) = params.override_shader {
            gfx.use_shader(depth)?;
            gfx.set_uniform(depth, "modelMat", self.model.into())?;
            gfx.set_uniform(depth, "viewMat", params.view.into())?;
            gfx.set_uniform(depth, "projMat", params.proj.into())?;
        } else {
            let Some(shader) = self.shader else {
                if !self.warned_no_shader {
                    log::warn!("render object has no shader; skipping it");
                    self.warned_no_shader = true;
                }
                return Ok(false);
            };
            gfx.use_shader(shader)?;
            gfx.set_uniform(shader, "modelMat", self.model.into())?;
            gfx.set_uniform(shader, "viewMat", params.view.into())?;
            gfx.set_uniform(shader, "projMat", params.proj.into())?;
            gfx.set_uniform(shader, "normalMat", self.normal.into())?;
            gfx.set_uniform(shader, "lightMat", params.light_space.into())?;
            if let Some(material) = &self.material {
                gfx.set_uniform(shader, "material.diffuse", material.diffuse.into())?;
                gfx.set_uniform(shader, "material.specular", material.specular.into())?;
                gfx.set_uniform(shader, "material.shininess", material.shininess.into())?;
                gfx.set_uniform(shader, "material.useDiffuseMap", material.diffuse_map.is_some().into())?;
                if let Some(texture) = material.diffuse_map {
                    gfx.bind_texture(params.diffuse_unit, texture)?;
                    gfx.set_uniform(shader, "material.diffuseMap", params.diffuse_unit.into())?;
                }
            }
        }

        self.upload(gfx)?;
        let Some(buffer) = self.buffer else {
            return Ok(false);
        };
        gfx.draw(buffer.id, self.mesh.vertex_count() as u32)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShaderKind;
    use crate::recording::RecordingBackend;
    use crate::texture::TextureUnit;
    use std::f32::consts::FRAC_PI_2;

    fn params(override_shader: Option<ShaderId>) -> DrawParams {
        DrawParams {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            light_space: Mat4::IDENTITY,
            override_shader,
            diffuse_unit: TextureUnit::new(1),
        }
    }

    #[test]
    fn pose_setters_refresh_matrices() {
        let mut obj = RenderObject::new();
        obj.set_position(Vec3::new(1.0, 2.0, 3.0));
        obj.set_rotation(Vec3::new(0.0, 0.0, FRAC_PI_2));
        let p = obj.model_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 3.0, 3.0), 1e-5));
        assert!((obj.normal_matrix() * Vec3::X).abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn draw_binds_transforms_and_material() {
        let mut gfx = RecordingBackend::new();
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        let mut obj = RenderObject::new().with_shader(lit);
        obj.gen_cube(1.0);

        assert!(obj.draw(&mut gfx, &params(None)).unwrap());
        let call = gfx.draws().last().unwrap();
        assert_eq!(call.shader, Some(lit));
        assert_eq!(call.vertex_count, 36);
        assert!(call.uniform("normalMat").is_some());
        assert!(call.uniform("lightMat").is_some());
        assert_eq!(call.uniform("material.useDiffuseMap").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn depth_override_binds_only_transforms() {
        let mut gfx = RecordingBackend::new();
        let depth = gfx.create_shader(ShaderKind::Depth).unwrap();
        let mut obj = RenderObject::new();
        obj.gen_plane(2.0, 2.0);

        assert!(obj.draw(&mut gfx, &params(Some(depth))).unwrap());
        let call = gfx.draws().last().unwrap();
        assert_eq!(call.shader, Some(depth));
        assert!(call.uniform("modelMat").is_some());
        assert!(call.uniform("normalMat").is_none());
        assert!(call.uniform("material.diffuse").is_none());
    }

    #[test]
    fn missing_shader_or_geometry_skips_the_draw() {
        let mut gfx = RecordingBackend::new();
        let mut obj = RenderObject::new();
        assert!(!obj.draw(&mut gfx, &params(None)).unwrap());
        obj.gen_cube(1.0);
        assert!(!obj.draw(&mut gfx, &params(None)).unwrap());
        assert!(gfx.draws().is_empty());
    }

    #[test]
    fn missing_material_skips_material_uniforms() {
        let mut gfx = RecordingBackend::new();
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        let mut obj = RenderObject::new().with_shader(lit);
        obj.clear_material();
        obj.gen_cube(1.0);
        assert!(obj.draw(&mut gfx, &params(None)).unwrap());
        assert!(gfx.draws()[0].uniform("material.diffuse").is_none());
    }

    #[test]
    fn diffuse_map_is_bound_to_the_given_unit() {
        let mut gfx = RecordingBackend::new();
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        let image = crate::texture::TextureImage::new(1, 1, crate::texture::PixelFormat::Rgba8, vec![255; 4]).unwrap();
        let tex = gfx.create_texture(&image).unwrap();
        let mut obj = RenderObject::new()
            .with_shader(lit)
            .with_material(Material::default().with_diffuse_map(tex));
        obj.gen_plane(1.0, 1.0);
        obj.draw(&mut gfx, &params(None)).unwrap();

        let call = &gfx.draws()[0];
        assert_eq!(call.texture_at(TextureUnit::new(1)), Some(tex));
        assert_eq!(call.uniform("material.diffuseMap").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn regenerating_replaces_buffer_without_leaking() {
        let mut gfx = RecordingBackend::new();
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        let mut obj = RenderObject::new().with_shader(lit);
        obj.gen_plane(1.0, 1.0);
        obj.draw(&mut gfx, &params(None)).unwrap();
        let first = obj.buffer().unwrap();

        obj.gen_sphere(1.0, 8, 8);
        obj.draw(&mut gfx, &params(None)).unwrap();
        let second = obj.buffer().unwrap();

        assert_ne!(first, second);
        assert_eq!(gfx.live_buffers(), 1);
        assert_eq!(gfx.draws()[1].vertex_count, (6 * 8 * 7) as u32);

        // shrinking reuses the larger buffer and draws the new count
        obj.gen_plane(1.0, 1.0);
        obj.draw(&mut gfx, &params(None)).unwrap();
        assert_eq!(obj.buffer(), Some(second));
        assert_eq!(gfx.draws()[2].vertex_count, 6);
        assert_eq!(gfx.draws()[2].vertices.len(), 6 * 8);
    }

    #[test]
    fn release_frees_the_buffer() {
        let mut gfx = RecordingBackend::new();
        let lit = gfx.create_shader(ShaderKind::Lit).unwrap();
        let mut obj = RenderObject::new().with_shader(lit);
        obj.gen_cube(1.0);
        obj.draw(&mut gfx, &params(None)).unwrap();
        obj.release(&mut gfx);
        assert_eq!(gfx.live_buffers(), 0);
        assert!(obj.draw(&mut gfx, &params(None)).unwrap());
        assert_eq!(gfx.live_buffers(), 1);
    }
}
