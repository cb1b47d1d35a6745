// Color utilities

use std::fmt;
use std::ops::Mul;

use glam::Vec4;
use rand::Rng;
use rand_distr::StandardNormal;

/// Straight-alpha RGBA color, each channel a fraction in `[0, 1]`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// HSV color with alpha. `h` is an angle in degrees, the rest are fractions.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorHsva {
    pub h: f32,
    pub s: f32,
    pub v: f32,
    pub a: f32,
}

pub mod colors {
    use super::ColorRgba;

    pub const BLACK: ColorRgba = ColorRgba::new(0.0, 0.0, 0.0, 1.0);
    pub const GREY25: ColorRgba = ColorRgba::new(0.25, 0.25, 0.25, 1.0);
    pub const GREY: ColorRgba = ColorRgba::new(0.75, 0.75, 0.75, 1.0);
    pub const WHITE: ColorRgba = ColorRgba::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: ColorRgba = ColorRgba::new(1.0, 0.0, 0.0, 1.0);
    pub const BLUE: ColorRgba = ColorRgba::new(0.0, 0.0, 1.0, 1.0);
    pub const GREEN: ColorRgba = ColorRgba::new(0.0, 1.0, 0.0, 1.0);
    pub const YELLOW: ColorRgba = ColorRgba::new(1.0, 1.0, 0.0, 1.0);
}

impl ColorRgba {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    /// Same color with a replaced alpha channel.
    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

impl ColorHsva {
    #[inline]
    pub const fn new(h: f32, s: f32, v: f32, a: f32) -> Self {
        Self { h, s, v, a }
    }

    #[inline]
    pub fn to_rgba(self) -> ColorRgba {
        hsv_to_rgb(self)
    }

    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        hsv_to_rgb(self).to_vec4()
    }
}

impl From<ColorHsva> for ColorRgba {
    fn from(c: ColorHsva) -> Self {
        hsv_to_rgb(c)
    }
}

impl From<ColorRgba> for wgpu::Color {
    fn from(c: ColorRgba) -> Self {
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }
    }
}

/// Scales RGB only; alpha is left alone so dimming never adds transparency.
impl Mul<f32> for ColorRgba {
    type Output = ColorRgba;

    fn mul(self, m: f32) -> ColorRgba {
        ColorRgba::new(self.r * m, self.g * m, self.b * m, self.a)
    }
}

impl Mul<ColorRgba> for f32 {
    type Output = ColorRgba;

    fn mul(self, c: ColorRgba) -> ColorRgba {
        c * self
    }
}

impl fmt::Display for ColorRgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r {:.2} g {:.2} b {:.2} a {:.2}", self.r, self.g, self.b, self.a)
    }
}

impl fmt::Display for ColorHsva {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h {:.2} s {:.2} v {:.2} a {:.2}", self.h, self.s, self.v, self.a)
    }
}

/// Weighted average of two colors. Weights are normalized, so only their
/// ratio matters.
pub fn blend(c1: ColorRgba, w1: f32, c2: ColorRgba, w2: f32) -> ColorRgba {
    let n1 = w1 / (w1 + w2);
    let n2 = w2 / (w1 + w2);
    ColorRgba::new(
        n1 * c1.r + n2 * c2.r,
        n1 * c1.g + n2 * c2.g,
        n1 * c1.b + n2 * c2.b,
        n1 * c1.a + n2 * c2.a,
    )
}

/// Sector-based HSV to RGB conversion. Hues at or past 360 wrap to 0.
pub fn hsv_to_rgb(c: ColorHsva) -> ColorRgba {
    if c.s <= 0.0 {
        return ColorRgba::new(c.v, c.v, c.v, c.a);
    }

    let mut hh = c.h;
    if hh >= 360.0 {
        hh = 0.0;
    }
    hh /= 60.0;
    let sector = hh as i64;
    let ff = hh - sector as f32;
    let p = c.v * (1.0 - c.s);
    let q = c.v * (1.0 - c.s * ff);
    let t = c.v * (1.0 - c.s * (1.0 - ff));

    let (r, g, b) = match sector {
        0 => (c.v, t, p),
        1 => (q, c.v, p),
        2 => (p, c.v, t),
        3 => (p, q, c.v),
        4 => (t, p, c.v),
        _ => (c.v, p, q),
    };
    ColorRgba::new(r, g, b, c.a)
}

/// Mean and standard deviation of the saturation draw.
pub const RANDOM_SATURATION: (f32, f32) = (0.8, 0.2);
/// Mean and standard deviation of the value draw.
pub const RANDOM_VALUE: (f32, f32) = (0.65, 0.1);

/// An opaque color with a uniformly random hue. Saturation and value are
/// normally distributed around a saturated, mid-bright color and clamped.
pub fn random_color() -> ColorRgba {
    random_color_with(&mut rand::thread_rng())
}

fn sample_normal<R: Rng + ?Sized>(rng: &mut R, (mean, std_dev): (f32, f32)) -> f32 {
    let z: f32 = rng.sample(StandardNormal);
    mean + std_dev * z
}

pub fn random_color_with<R: Rng + ?Sized>(rng: &mut R) -> ColorRgba {
    let hue = rng.gen_range(0.0..360.0);
    let sat = sample_normal(rng, RANDOM_SATURATION);
    let val = sample_normal(rng, RANDOM_VALUE);
    log::debug!("random color hue {hue:.2} sat {sat:.2} val {val:.2}");
    hsv_to_rgb(ColorHsva::new(hue, sat.clamp(0.0, 1.0), val.clamp(0.0, 1.0), 1.0)).with_alpha(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_color_eq(a: ColorRgba, b: ColorRgba) {
        assert_abs_diff_eq!(a.r, b.r, epsilon = 1e-5);
        assert_abs_diff_eq!(a.g, b.g, epsilon = 1e-5);
        assert_abs_diff_eq!(a.b, b.b, epsilon = 1e-5);
        assert_abs_diff_eq!(a.a, b.a, epsilon = 1e-5);
    }

    #[test]
    fn blend_normalizes_weights() {
        let mixed = blend(colors::RED, 3.0, colors::BLUE, 1.0);
        assert_color_eq(mixed, ColorRgba::new(0.75, 0.0, 0.25, 1.0));

        let same = blend(colors::RED, 30.0, colors::BLUE, 10.0);
        assert_color_eq(same, mixed);
    }

    #[test]
    fn hsv_primaries() {
        assert_color_eq(hsv_to_rgb(ColorHsva::new(0.0, 1.0, 1.0, 1.0)), colors::RED);
        assert_color_eq(hsv_to_rgb(ColorHsva::new(120.0, 1.0, 1.0, 1.0)), colors::GREEN);
        assert_color_eq(hsv_to_rgb(ColorHsva::new(240.0, 1.0, 1.0, 1.0)), colors::BLUE);
        assert_color_eq(hsv_to_rgb(ColorHsva::new(60.0, 1.0, 1.0, 0.5)), colors::YELLOW.with_alpha(0.5));
    }

    #[test]
    fn hsv_full_turn_wraps_to_red() {
        assert_color_eq(hsv_to_rgb(ColorHsva::new(360.0, 1.0, 1.0, 1.0)), colors::RED);
    }

    #[test]
    fn hsv_without_saturation_is_grey() {
        let grey = hsv_to_rgb(ColorHsva::new(200.0, 0.0, 0.4, 1.0));
        assert_color_eq(grey, ColorRgba::new(0.4, 0.4, 0.4, 1.0));
    }

    #[test]
    fn scaling_keeps_alpha() {
        let c = ColorRgba::new(0.5, 0.2, 1.0, 0.8) * 0.5;
        assert_color_eq(c, ColorRgba::new(0.25, 0.1, 0.5, 0.8));
        assert_color_eq(0.5 * ColorRgba::new(0.5, 0.2, 1.0, 0.8), c);
    }

    #[test]
    fn random_colors_are_opaque_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let c = random_color_with(&mut rng);
            assert_eq!(c.a, 1.0);
            for ch in [c.r, c.g, c.b] {
                assert!((0.0..=1.0).contains(&ch));
            }
        }
    }

    #[test]
    fn random_saturation_and_value_cluster_around_their_means() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 4000;
        let (mut sat_sum, mut val_sum) = (0.0, 0.0);
        for _ in 0..n {
            sat_sum += sample_normal(&mut rng, RANDOM_SATURATION);
            val_sum += sample_normal(&mut rng, RANDOM_VALUE);
        }
        assert_abs_diff_eq!(sat_sum / n as f32, 0.8, epsilon = 0.02);
        assert_abs_diff_eq!(val_sum / n as f32, 0.65, epsilon = 0.01);
    }

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(colors::GREY25.to_string(), "r 0.25 g 0.25 b 0.25 a 1.00");
    }
}
