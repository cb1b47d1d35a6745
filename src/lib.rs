//! scenegfx: a small 2D/3D rendering toolkit.
//!
//! A [`Scene`] holds render objects, cameras and one directional light, draws
//! them in a shadow pass and a lit color pass, and offers immediate-mode 2D
//! drawing (shapes and text) layered on top. All GPU work goes through a
//! [`RenderBackend`]: [`WgpuBackend`] renders to a window, [`RecordingBackend`]
//! records calls for inspection.

pub mod backend;
pub mod camera;
pub mod color;
pub mod config;
pub mod error;
pub mod font;
pub mod light;
pub mod logging;
pub mod material;
pub mod math;
pub mod mesh;
pub mod overlay;
pub mod recording;
pub mod render_object;
pub mod renderer;
pub mod scene;
pub mod shadow;
pub mod texture;
pub mod window;

pub use backend::{CullMode, RenderBackend, ShaderId, ShaderKind, TextureId, UniformValue};
pub use camera::{Camera, Projection};
pub use color::{ColorHsva, ColorRgba};
pub use config::SceneConfig;
pub use error::{GfxError, Result};
pub use font::{Font, Glyph, GlyphSource};
pub use light::DirectionalLight;
pub use material::Material;
pub use mesh::MeshData;
pub use overlay::{TextAlign, TextLayout};
pub use recording::RecordingBackend;
pub use render_object::RenderObject;
pub use renderer::WgpuBackend;
pub use scene::{CameraId, FrameStats, ObjectId, Scene};
pub use shadow::{OriginShadowFrustum, ShadowFrustum};
pub use texture::{Texture, TextureImage};
pub use window::{SceneApp, WindowConfig};
