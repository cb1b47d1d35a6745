//! Procedural geometry for primitives.
//!
//! Every generator returns a flattened, per-corner vertex array: three
//! vertices per triangle, no index buffer. Triangles wind counter-clockwise
//! seen from outside, and normals are final, so the data can be uploaded as
//! is.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::math::slerp;

/// How far cube normals lean from the flat face normal toward the corner
/// direction. 0 is fully faceted, 1 is fully rounded.
pub const CUBE_NORMAL_SLERP_FACTOR: f32 = 0.1;

/// Texel density of generated planes (texcoord per world unit).
pub const PLANE_TEXEL_SCALE: f32 = 0.1;

/// Interleaved vertex: position, normal, texcoord.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Floats per vertex.
    pub const WIDTH: usize = 8;

    pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// Generated geometry, one entry per triangle corner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Expands an indexed vertex pool into per-corner vertices.
    fn from_indexed(indices: &[usize], mut corner: impl FnMut(usize, usize) -> Vertex) -> Self {
        let vertices = indices
            .iter()
            .enumerate()
            .map(|(slot, &index)| corner(slot, index))
            .collect();
        Self { vertices }
    }
}

/// Flat `width × depth` plane in the XZ plane, facing +Y.
pub fn plane(width: f32, depth: f32) -> MeshData {
    let corners: Vec<Vec3> = (0..4)
        .map(|i| {
            Vec3::new(
                width * (i & 1) as f32 - 0.5 * width,
                0.0,
                depth * ((i & 2) >> 1) as f32 - 0.5 * depth,
            )
        })
        .collect();

    const INDICES: [usize; 6] = [0, 2, 3, 3, 1, 0];

    MeshData::from_indexed(&INDICES, |_, i| {
        let p = corners[i];
        Vertex::new(p, Vec3::Y, [p.x * PLANE_TEXEL_SCALE, p.z * PLANE_TEXEL_SCALE])
    })
}

/// Axis-aligned cube centred on the origin.
///
/// Corner `i` takes its x/y/z sign from bits 0/1/2 of `i`. Normals are the
/// face normal slerped toward the corner direction by
/// [`CUBE_NORMAL_SLERP_FACTOR`], which softens the edges when lit.
pub fn cube(side: f32) -> MeshData {
    let corners: Vec<Vec3> = (0..8)
        .map(|i| {
            Vec3::new(
                side * (i & 1) as f32 - 0.5 * side,
                side * ((i & 2) >> 1) as f32 - 0.5 * side,
                side * ((i & 4) >> 2) as f32 - 0.5 * side,
            )
        })
        .collect();

    #[rustfmt::skip]
    const INDICES: [usize; 36] = [
        2, 3, 1, 1, 0, 2, // -z
        3, 7, 5, 5, 1, 3, // +x
        7, 6, 4, 4, 5, 7, // +z
        6, 2, 0, 0, 4, 6, // -x
        3, 2, 6, 6, 7, 3, // +y
        5, 4, 0, 0, 1, 5, // -y
    ];

    // six corners per face, in the order of INDICES
    const FACE_NORMALS: [Vec3; 6] = [
        Vec3::NEG_Z,
        Vec3::X,
        Vec3::Z,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
    ];

    MeshData::from_indexed(&INDICES, |slot, i| {
        let p = corners[i];
        let normal = slerp(FACE_NORMALS[slot / 6], p.normalize(), CUBE_NORMAL_SLERP_FACTOR);
        Vertex::new(p, normal, [p.x, p.y])
    })
}

/// UV sphere: north pole, `lat_segments - 1` rings of `lon_segments`
/// vertices, south pole.
///
/// Needs `lat_segments >= 2` and `lon_segments >= 3`; smaller values are
/// raised to those minimums.
pub fn sphere(radius: f32, lat_segments: u32, lon_segments: u32) -> MeshData {
    let lat = lat_segments.max(2) as usize;
    let lon = lon_segments.max(3) as usize;
    if lat != lat_segments as usize || lon != lon_segments as usize {
        log::warn!(
            "sphere needs at least 2 latitude and 3 longitude segments, got {lat_segments}x{lon_segments}"
        );
    }

    let mut pool = Vec::with_capacity(2 + (lat - 1) * lon);
    pool.push(Vec3::new(0.0, radius, 0.0));
    for i in 1..lat {
        let minor = (90.0 - 180.0 * i as f32 / lat as f32).to_radians();
        let ring_radius = minor.cos() * radius;
        for j in 0..lon {
            let major = -(2.0 * PI * j as f32 / lon as f32);
            pool.push(Vec3::new(
                major.cos() * ring_radius,
                minor.sin() * radius,
                major.sin() * ring_radius,
            ));
        }
    }
    pool.push(Vec3::new(0.0, -radius, 0.0));
    let south = pool.len() - 1;

    let ring = |i: usize, j: usize| 1 + i * lon + j % lon;
    let mut indices = Vec::with_capacity(6 * lon * (lat - 1));

    // north cap
    for j in 0..lon {
        indices.extend_from_slice(&[0, ring(0, j), ring(0, j + 1)]);
    }
    // bands
    for i in 0..lat - 2 {
        for j in 0..lon {
            let a = ring(i, j);
            let b = ring(i + 1, j);
            let c = ring(i + 1, j + 1);
            let d = ring(i, j + 1);
            indices.extend_from_slice(&[a, b, c, c, d, a]);
        }
    }
    // south cap
    for j in 0..lon {
        indices.extend_from_slice(&[ring(lat - 2, j), south, ring(lat - 2, j + 1)]);
    }

    MeshData::from_indexed(&indices, |_, i| {
        let p = pool[i];
        Vertex::new(p, p.normalize(), [p.x, p.y])
    })
}

/// Torus around the Y axis.
///
/// `minor_segments` steps go around the tube, `major_segments` around the
/// main axis. Normals come from the parameterization, not from triangles.
pub fn torus(major_radius: f32, minor_radius: f32, minor_segments: u32, major_segments: u32) -> MeshData {
    let n_minor = minor_segments.max(3) as usize;
    let n_major = major_segments.max(3) as usize;
    if n_minor != minor_segments as usize || n_major != major_segments as usize {
        log::warn!(
            "torus needs at least 3 segments each way, got {minor_segments}x{major_segments}"
        );
    }

    let mut pool = Vec::with_capacity(n_minor * n_major);
    for j in 0..n_minor {
        let minor = 2.0 * PI * j as f32 / n_minor as f32;
        for i in 0..n_major {
            let major = 2.0 * PI * i as f32 / n_major as f32;
            let reach = major_radius + minor_radius * minor.cos();
            let position = Vec3::new(reach * major.cos(), minor_radius * minor.sin(), reach * major.sin());
            let normal = Vec3::new(major.cos() * minor.cos(), minor.sin(), major.sin() * minor.cos());
            pool.push((position, normal));
        }
    }

    // wraps on both the tube and the ring index
    let at = |tube: usize, ring: usize| (tube % n_minor) * n_major + ring % n_major;
    let mut indices = Vec::with_capacity(6 * n_minor * n_major);
    for ring in 0..n_major {
        for tube in 0..n_minor {
            let a = at(tube, ring);
            let b = at(tube + 1, ring);
            let c = at(tube + 1, ring + 1);
            let d = at(tube, ring + 1);
            indices.extend_from_slice(&[a, b, c, c, d, a]);
        }
    }

    MeshData::from_indexed(&indices, |_, i| {
        let (p, n) = pool[i];
        Vertex::new(p, n, [p.x, p.y])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Every triangle must face away from `inside(triangle)`.
    fn assert_outward(mesh: &MeshData, outward: impl Fn(&[Vertex]) -> Vec3) {
        for tri in mesh.vertices.chunks_exact(3) {
            let (a, b, c) = (tri[0].position(), tri[1].position(), tri[2].position());
            let face = (b - a).cross(c - a);
            assert!(face.dot(outward(tri)) > 0.0, "triangle {a} {b} {c} winds inward");
        }
    }

    fn centroid(tri: &[Vertex]) -> Vec3 {
        (tri[0].position() + tri[1].position() + tri[2].position()) / 3.0
    }

    #[test]
    fn vertex_is_eight_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), Vertex::WIDTH * 4);
        let mesh = plane(1.0, 1.0);
        assert_eq!(mesh.as_floats().len(), mesh.vertex_count() * Vertex::WIDTH);
    }

    #[test]
    fn plane_is_two_up_facing_triangles() {
        let mesh = plane(2.0, 2.0);
        assert_eq!(mesh.vertex_count(), 6);
        for v in &mesh.vertices {
            assert_eq!(v.normal(), Vec3::Y);
            assert_abs_diff_eq!(v.position[1], 0.0);
            assert_abs_diff_eq!(v.uv[0], v.position[0] * 0.1);
            assert_abs_diff_eq!(v.uv[1], v.position[2] * 0.1);
        }
        assert_outward(&mesh, |_| Vec3::Y);
    }

    #[test]
    fn cube_has_twelve_outward_triangles() {
        let mesh = cube(2.0);
        assert_eq!(mesh.vertex_count(), 36);
        assert_outward(&mesh, centroid);
        for v in &mesh.vertices {
            for c in v.position {
                assert_abs_diff_eq!(c.abs(), 1.0);
            }
        }
    }

    #[test]
    fn cube_normals_lean_slightly_toward_corners() {
        let mesh = cube(1.0);
        let full_angle = (1.0f32 / 3f32.sqrt()).acos();
        for (slot, v) in mesh.vertices.iter().enumerate() {
            let n = v.normal();
            assert_abs_diff_eq!(n.length(), 1.0, epsilon = 1e-5);
            let face = [Vec3::NEG_Z, Vec3::X, Vec3::Z, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y][slot / 6];
            let lean = n.dot(face).clamp(-1.0, 1.0).acos();
            assert_abs_diff_eq!(lean, full_angle * CUBE_NORMAL_SLERP_FACTOR, epsilon = 1e-3);
            // and toward the corner, not away from it
            assert!(n.dot(v.position().normalize()) > face.dot(v.position().normalize()));
        }
    }

    #[test]
    fn sphere_counts_and_normals() {
        for (lat, lon) in [(2, 3), (3, 4), (8, 12), (16, 7)] {
            let mesh = sphere(2.5, lat, lon);
            let lat = lat as usize;
            let lon = lon as usize;
            assert_eq!(mesh.vertex_count(), 3 * lon + 6 * lon * (lat - 2) + 3 * lon);
            assert_eq!(mesh.vertex_count(), 6 * lon * (lat - 1));
            for v in &mesh.vertices {
                let n = v.normal();
                assert_abs_diff_eq!(n.length(), 1.0, epsilon = 1e-5);
                assert_abs_diff_eq!(v.position().normalize().dot(n), 1.0, epsilon = 1e-5);
                assert_abs_diff_eq!(v.position().length(), 2.5, epsilon = 1e-4);
            }
            assert_outward(&mesh, centroid);
        }
    }

    #[test]
    fn degenerate_segment_counts_are_raised_to_the_minimum() {
        // 2 latitude bands, 3 longitudes: two caps of 3 triangles
        let low = sphere(1.0, 1, 2);
        assert_eq!(low.triangle_count(), 6);
        assert_eq!(low, sphere(1.0, 2, 3));
        for v in &low.vertices {
            assert_abs_diff_eq!(v.position().length(), 1.0, epsilon = 1e-5);
        }

        // 3 x 3 quads
        let low = torus(2.0, 0.5, 1, 1);
        assert_eq!(low.triangle_count(), 18);
        assert_eq!(low, torus(2.0, 0.5, 3, 3));

        assert_eq!(sphere(1.0, 0, 0).triangle_count(), 6);
        assert_eq!(torus(2.0, 0.5, 0, 0).triangle_count(), 18);
    }

    #[test]
    fn torus_vertices_stay_within_the_tube() {
        let (major, minor) = (3.0, 0.75);
        let mesh = torus(major, minor, 9, 17);
        assert_eq!(mesh.vertex_count(), 6 * 9 * 17);
        for v in &mesh.vertices {
            let p = v.position();
            let axis_distance = (p.x * p.x + p.z * p.z).sqrt();
            assert!(axis_distance >= major - minor - 1e-4);
            assert!(axis_distance <= major + minor + 1e-4);
            assert_abs_diff_eq!(v.normal().length(), 1.0, epsilon = 1e-5);
        }
        assert_outward(&mesh, |tri| tri[0].normal() + tri[1].normal() + tri[2].normal());
    }

    #[test]
    fn torus_normal_points_from_tube_centre() {
        let (major, minor) = (2.0, 0.5);
        let mesh = torus(major, minor, 6, 10);
        for v in &mesh.vertices {
            let p = v.position();
            let centre = Vec3::new(p.x, 0.0, p.z).normalize() * major;
            let expected = (p - centre).normalize();
            assert!(v.normal().abs_diff_eq(expected, 1e-4));
        }
    }
}
