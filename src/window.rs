//! Window and event loop hosting a [`Scene`] on the wgpu backend.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use crate::color::ColorRgba;
use crate::error::Result;
use crate::renderer::WgpuBackend;
use crate::scene::Scene;

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: ColorRgba,
    pub present_mode: wgpu::PresentMode,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "scenegfx".to_string(),
            width: 1280,
            height: 720,
            clear_color: ColorRgba::new(0.1, 0.1, 0.12, 1.0),
            present_mode: wgpu::PresentMode::AutoVsync,
        }
    }
}

/// Hooks the event loop calls into. Only `setup` is required.
pub trait SceneApp {
    /// Called once, after the scene knows the window size.
    fn setup(&mut self, scene: &mut Scene, gfx: &mut WgpuBackend) -> Result<()>;

    /// Called before each frame with the seconds since the previous one.
    fn update(&mut self, _scene: &mut Scene, _dt: f32) {}

    /// Called after the 3D pass; 2D drawing goes here.
    fn overlay(&mut self, _scene: &mut Scene, _gfx: &mut WgpuBackend) -> Result<()> {
        Ok(())
    }

    fn key(&mut self, _scene: &mut Scene, _key: KeyCode, _pressed: bool) {}

    /// Called once as the loop exits, before the scene is released. Free
    /// anything `setup` created on the backend here.
    fn exit(&mut self, _gfx: &mut WgpuBackend) {}
}

fn frame(scene: &mut Scene, gfx: &mut WgpuBackend, app: &mut impl SceneApp, clear: ColorRgba) -> Result<()> {
    scene.begin_frame(gfx, clear)?;
    let stats = scene.render(gfx)?;
    log::trace!("frame: {} shadow draws, {} color draws", stats.shadow_draws, stats.color_draws);
    app.overlay(scene, gfx)?;
    gfx.present()
}

fn resize(scene: &mut Scene, gfx: &mut WgpuBackend, size: PhysicalSize<u32>) -> Result<()> {
    if size.width == 0 || size.height == 0 {
        return Ok(());
    }
    gfx.resize(size.width, size.height);
    scene.resize(size.width, size.height)
}

/// Opens a window and drives `app` until the window is closed or a frame fails.
pub async fn run(config: WindowConfig, mut app: impl SceneApp) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let mut gfx = WgpuBackend::new(window.clone(), config.present_mode).await?;
    let mut scene = Scene::new(&mut gfx)?;
    let (width, height) = gfx.size();
    scene.set_window_dimensions(width, height);
    app.setup(&mut scene, &mut gfx)?;
    log::info!("scene ready with {} objects", scene.object_count());

    let mut scene = Some(scene);
    let mut last_frame = Instant::now();
    event_loop.run(move |event, target| {
        target.set_control_flow(ControlFlow::Poll);

        if let Event::LoopExiting = event {
            app.exit(&mut gfx);
            if let Some(scene) = scene.take() {
                scene.release(&mut gfx);
            }
            return;
        }
        let Some(scene) = scene.as_mut() else {
            return;
        };

        match event {
            Event::WindowEvent { window_id, event: WindowEvent::CloseRequested } if window_id == window.id() => {
                target.exit();
            }
            Event::WindowEvent { event: WindowEvent::Resized(size), window_id } if window_id == window.id() => {
                if let Err(e) = resize(scene, &mut gfx, size) {
                    log::error!("resize failed: {e}");
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::WindowEvent { event: WindowEvent::RedrawRequested, window_id } if window_id == window.id() => {
                let dt = last_frame.elapsed().as_secs_f32();
                last_frame = Instant::now();
                app.update(scene, dt);
                if let Err(e) = frame(scene, &mut gfx, &mut app, config.clear_color) {
                    log::error!("frame failed: {e}");
                    target.exit();
                }
            }
            Event::WindowEvent {
                event:
                    WindowEvent::KeyboardInput {
                        event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                        ..
                    },
                window_id,
            } if window_id == window.id() => {
                app.key(scene, code, state == ElementState::Pressed);
            }
            _ => {}
        }
    })?;
    Ok(())
}
