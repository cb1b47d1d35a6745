//! Error types shared by the scene, the backends and the asset loaders.
//!
//! Configuration problems that only degrade a frame (an object without a
//! shader, no light yet) are logged where they happen and never reach this
//! type. Everything here is either a broken caller contract or a resource
//! that could not be acquired.

use thiserror::Error;

use crate::backend::{BufferId, FramebufferId, ShaderId, TextureId};
use crate::scene::{CameraId, ObjectId};

#[derive(Error, Debug)]
pub enum GfxError {
    // ========================================================================
    // Scene registry
    // ========================================================================
    #[error("no render object with id {0}")]
    UnknownObject(ObjectId),

    #[error("no camera with id {0}")]
    UnknownCamera(CameraId),

    #[error("glyph {0:?} is not in the loaded set")]
    MissingGlyph(char),

    #[error("font is not ready")]
    FontNotReady,

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("a directional light must be set before shadows can be configured")]
    MissingLight,

    #[error("shadows have not been configured; call setup_shadows first")]
    ShadowsNotConfigured,

    #[error("invalid projection: {0}")]
    InvalidProjection(String),

    #[error("window dimensions are not set; 2D drawing needs a viewport")]
    ViewportNotSet,

    // ========================================================================
    // Backend resources
    // ========================================================================
    #[error("vertex data of {needed} floats does not fit a buffer of {capacity} floats")]
    BufferOverflow { needed: usize, capacity: usize },

    #[error("unknown vertex buffer {0:?}")]
    UnknownBuffer(BufferId),

    #[error("unknown shader {0:?}")]
    UnknownShader(ShaderId),

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("unknown framebuffer {0:?}")]
    UnknownFramebuffer(FramebufferId),

    #[error("all {0} texture units are in use")]
    TextureUnitsExhausted(u32),

    #[error("unsupported pixel layout with {0} channels")]
    UnsupportedChannels(u8),

    // ========================================================================
    // Assets & platform
    // ========================================================================
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to load font: {0}")]
    Font(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to request a GPU adapter")]
    AdapterRequestFailed,

    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

pub type Result<T> = std::result::Result<T, GfxError>;
