// Scene tunables

/// Sizes and constants the scene is built with.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Edge length of the square shadow map, in texels.
    pub shadow_map_size: u32,
    /// Half extent of the light's orthographic box.
    pub shadow_half_width: f32,
    /// Far plane of the light's orthographic box.
    pub shadow_depth: f32,
    /// How far from the origin the light camera sits, along `-direction`.
    pub light_distance: f32,
    /// Capacity of the shared 2D vertex buffer, in floats.
    pub overlay_capacity: usize,
    /// Perimeter points of 2D circles.
    pub circle_segments: u32,
    /// Depth of the first 2D draw after a reset.
    pub depth_start: f32,
    /// Depth change per 2D draw. Positive values paint later calls on top.
    pub depth_step: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 4096,
            shadow_half_width: 60.0,
            shadow_depth: 100.0,
            light_distance: 30.0,
            overlay_capacity: 4000,
            circle_segments: 100,
            depth_start: -99.0,
            depth_step: 1.0,
        }
    }
}
