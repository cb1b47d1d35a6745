// scenegfx demo: lit primitives with shadows and a 2D overlay

use glam::{Vec2, Vec3};
use scenegfx::color::colors;
use scenegfx::logging::{init_logging, LoggingConfig};
use scenegfx::window::{self, SceneApp, WindowConfig};
use scenegfx::{
    Camera, ColorRgba, DirectionalLight, Font, Material, ObjectId, RenderBackend, RenderObject, Scene, ShaderId, ShaderKind,
    TextAlign, TextLayout, WgpuBackend,
};
use winit::keyboard::KeyCode;

const FONT_ENV: &str = "SCENEGFX_FONT";
const TURN_SPEED: f32 = 90.0;
/// Degrees per second around Y; X turns at half this rate.
const SPIN_SPEED: f32 = 40.0;

/// Euler angles (radians) of the `index`-th spinning shape after `elapsed`
/// seconds. Shapes start 30 degrees apart.
fn spin_angles(elapsed: f32, index: usize) -> Vec3 {
    let t = (elapsed * SPIN_SPEED + index as f32 * 30.0).to_radians();
    Vec3::new(t * 0.5, t, 0.0)
}

#[derive(Default)]
struct Keys {
    w: bool,
    a: bool,
    s: bool,
    d: bool,
}

#[derive(Default)]
struct Demo {
    spinning: Vec<ObjectId>,
    lit: Option<ShaderId>,
    font: Option<Font>,
    keys: Keys,
    elapsed: f32,
    fps: f32,
}

impl SceneApp for Demo {
    fn setup(&mut self, scene: &mut Scene, gfx: &mut WgpuBackend) -> scenegfx::Result<()> {
        let lit = gfx.create_shader(ShaderKind::Lit)?;
        self.lit = Some(lit);

        let (width, height) = gfx.size();
        let mut camera = Camera::new();
        camera.set_perspective(45.0, width as f32 / height.max(1) as f32)?;
        camera.set_position(Vec3::new(0.0, 4.0, 14.0));
        camera.set_pitch(-15.0);
        let camera = scene.add_camera(camera);
        scene.set_active_camera(camera)?;

        let mut ground = RenderObject::new()
            .with_shader(lit)
            .with_material(Material::new(colors::GREY, colors::BLACK, 1.0));
        ground.gen_plane(40.0, 40.0);
        ground.set_position(Vec3::new(0.0, -1.5, 0.0));
        scene.add_render_object(ground);

        let shapes = [
            (Vec3::new(-4.0, 0.0, 0.0), colors::RED),
            (Vec3::new(0.0, 0.0, 0.0), colors::GREEN),
            (Vec3::new(4.0, 0.0, 0.0), colors::BLUE),
        ];
        for (i, (position, color)) in shapes.into_iter().enumerate() {
            let mut object = RenderObject::new()
                .with_shader(lit)
                .with_material(Material::new(color, colors::WHITE, 32.0));
            match i {
                0 => object.gen_cube(2.0),
                1 => object.gen_sphere(1.2, 24, 32),
                _ => object.gen_torus(1.2, 0.4, 16, 48),
            }
            object.set_position(position);
            self.spinning.push(scene.add_render_object(object));
        }

        scene.set_directional_light(DirectionalLight::new(Vec3::new(-0.5, -1.0, -0.3), lit));
        scene.setup_shadows(gfx)?;
        scene.set_shadows_enabled(true)?;

        self.font = std::env::var(FONT_ENV).ok().map(|path| Font::from_file(gfx, path, 24.0));
        if self.font.is_none() {
            log::info!("set {FONT_ENV} to a .ttf file to enable text");
        }
        Ok(())
    }

    fn update(&mut self, scene: &mut Scene, dt: f32) {
        self.elapsed += dt;
        if dt > 0.0 {
            self.fps = 0.9 * self.fps + 0.1 / dt;
        }

        for (i, &id) in self.spinning.iter().enumerate() {
            if let Ok(object) = scene.render_object_mut(id) {
                object.set_rotation(spin_angles(self.elapsed, i));
            }
        }

        let turn = TURN_SPEED * dt;
        if let Some(camera) = scene.active_camera_mut() {
            let (yaw, pitch) = (camera.yaw(), camera.pitch());
            if self.keys.a {
                camera.set_yaw(yaw + turn);
            }
            if self.keys.d {
                camera.set_yaw(yaw - turn);
            }
            if self.keys.w {
                camera.set_pitch(pitch + turn);
            }
            if self.keys.s {
                camera.set_pitch(pitch - turn);
            }
        }
    }

    fn overlay(&mut self, scene: &mut Scene, gfx: &mut WgpuBackend) -> scenegfx::Result<()> {
        let (width, height) = gfx.size();
        let (w, h) = (width as f32, height as f32);

        scene.draw_rectangle(gfx, ColorRgba::new(0.0, 0.0, 0.0, 0.5), Vec2::new(10.0, 10.0), Vec2::new(260.0, 70.0))?;
        scene.draw_circle(gfx, colors::YELLOW, Vec2::new(w - 60.0, h - 60.0), 30.0)?;
        scene.draw_circle_outline(gfx, colors::WHITE, Vec2::new(w - 60.0, h - 60.0), 40.0, 4.0)?;
        scene.draw_arrow(gfx, colors::WHITE, Vec2::new(w - 160.0, h - 60.0), Vec2::new(w - 110.0, h - 60.0), 3.0)?;
        scene.draw_multi_line(
            gfx,
            colors::GREEN,
            &[Vec2::new(20.0, h - 20.0), Vec2::new(60.0, h - 60.0), Vec2::new(100.0, h - 30.0)],
            2.0,
        )?;

        if let Some(font) = &self.font {
            let fps = format!("{:.0} fps", self.fps);
            scene.draw_text(gfx, font, &fps, colors::WHITE, &TextLayout::at(Vec2::new(20.0, 30.0)))?;
            let hint = TextLayout::at(Vec2::new(0.0, 80.0)).with_max_width(w).with_align(TextAlign::Center);
            scene.draw_text(gfx, font, "WASD to look around", colors::GREY, &hint)?;
        }
        Ok(())
    }

    fn key(&mut self, _scene: &mut Scene, key: KeyCode, pressed: bool) {
        match key {
            KeyCode::KeyW => self.keys.w = pressed,
            KeyCode::KeyA => self.keys.a = pressed,
            KeyCode::KeyS => self.keys.s = pressed,
            KeyCode::KeyD => self.keys.d = pressed,
            _ => {}
        }
    }

    fn exit(&mut self, gfx: &mut WgpuBackend) {
        if let Some(mut font) = self.font.take() {
            font.release(gfx);
        }
        if let Some(lit) = self.lit.take() {
            gfx.destroy_shader(lit);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = WindowConfig {
        title: "scenegfx demo".to_string(),
        ..Default::default()
    };
    window::run(config, Demo::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn shapes_spin_forty_degrees_per_second() {
        let start = spin_angles(0.0, 0);
        let later = spin_angles(9.0, 0);
        assert_eq!(start, Vec3::ZERO);
        // 9 s at 40 deg/s is exactly one turn around Y
        assert_abs_diff_eq!(later.y, std::f32::consts::TAU, epsilon = 1e-4);
        assert_abs_diff_eq!(later.x, std::f32::consts::PI, epsilon = 1e-4);
        assert_abs_diff_eq!(spin_angles(0.0, 1).y, 30f32.to_radians(), epsilon = 1e-6);
    }
}
